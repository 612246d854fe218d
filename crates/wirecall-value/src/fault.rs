use std::fmt;

use crate::value::Value;

/// A structured error returned in place of a reply's result.
///
/// `detail` is carried verbatim from the wire; consumers must treat it as
/// opaque unless they recognize the embedded type. The codec never mutates a
/// foreign detail value; `message` annotates the fault itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    pub code: String,
    pub message: String,
    pub detail: Option<Value>,
}

impl Fault {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for Fault {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_code_and_message() {
        let fault = Fault::new("NoMethod", "missing");
        assert_eq!(fault.to_string(), "NoMethod: missing");
    }

    #[test]
    fn detail_is_optional_and_opaque() {
        let fault = Fault::new("ServiceException", "boom")
            .with_detail(Value::map(vec![(Value::from("cause"), Value::Null)]));
        assert!(fault.detail.is_some());
    }
}
