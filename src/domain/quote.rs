/// A motivational quote picked from the quote source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub text: String,
    pub author: String,
}

impl Quote {
    pub fn new(text: impl Into<String>, author: impl Into<String>) -> Quote {
        Quote {
            text: text.into(),
            author: author.into(),
        }
    }
}
