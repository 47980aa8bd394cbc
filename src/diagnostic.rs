use std::fmt;

use crate::{codegen, parser, token::Positioned};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A message for the user, tied to a source location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub line: u32,
    /// Only known for scanner and parser diagnostics.
    pub column: Option<u32>,
    pub message: String,
}

impl Diagnostic {
    pub fn error(line: u32, column: Option<u32>, message: impl Into<String>) -> Diagnostic {
        Diagnostic {
            severity: Severity::Error,
            line,
            column,
            message: message.into(),
        }
    }

    pub fn warning(line: u32, message: impl Into<String>) -> Diagnostic {
        Diagnostic {
            severity: Severity::Warning,
            line,
            column: None,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl From<&Positioned<parser::Error>> for Diagnostic {
    fn from(error: &Positioned<parser::Error>) -> Self {
        let pos = error.pos;
        Diagnostic::error(pos.line, Some(pos.col), error.inner.to_string())
    }
}

impl From<&codegen::Error> for Diagnostic {
    fn from(error: &codegen::Error) -> Self {
        Diagnostic::error(error.line, None, error.to_string())
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "Error",
            Severity::Warning => "Warning",
        };
        write!(f, "{severity} L{}", self.line)?;
        if let Some(column) = self.column {
            write!(f, " C{column}")?;
        }
        write!(f, ": {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{codegen::ErrorKind, token::Pos};

    #[test]
    fn test_render() {
        let parse_error = Pos::new(3, 7).wrap(parser::Error::UnexpectedEof);
        assert_eq!(
            Diagnostic::from(&parse_error).to_string(),
            "Error L3 C7: unexpected end of input"
        );

        let lowering_error = codegen::Error {
            line: 12,
            kind: ErrorKind::UndefinedFunction("foo".into()),
        };
        assert_eq!(
            Diagnostic::from(&lowering_error).to_string(),
            "Error L12: undefined function foo"
        );

        let warning = Diagnostic::warning(2, "type color is ignored");
        assert!(!warning.is_error());
        assert_eq!(warning.to_string(), "Warning L2: type color is ignored");
    }
}
