//! Parsed form of a textual scene command.
//!
//! Lines are trimmed, lowercased and split on runs of whitespace; the first
//! token is the verb. Operands beyond the required count are ignored.

use std::fmt;
use std::str::FromStr;

use super::Shape;
use crate::error::RelayError;

/// Verbs understood by the command grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// `create <shape> <name>`
    Create,
    /// `delete <name>`
    Delete,
    /// `select <name>`
    Select,
    /// `list`
    List,
}

impl Verb {
    /// Returns the lowercase keyword.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Select => "select",
            Self::List => "list",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "delete" => Ok(Self::Delete),
            "select" => Ok(Self::Select),
            "list" => Ok(Self::List),
            other => Err(RelayError::InvalidVerb(other.to_string())),
        }
    }
}

/// Structured commands the tool adapter relays by name.
///
/// A relayed `command` string matching one of these is executed with its
/// `params` object; any other string is treated as a grammar line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    /// `create_object{shape, name, position?, size?, color?}`
    CreateObject,
    /// `delete_object{name}`
    DeleteObject,
    /// `select_object{name}`
    SelectObject,
    /// `list_objects{}`
    ListObjects,
}

impl ToolName {
    /// Every tool, in the order they are advertised.
    pub const ALL: [Self; 4] = [
        Self::CreateObject,
        Self::DeleteObject,
        Self::SelectObject,
        Self::ListObjects,
    ];

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CreateObject => "create_object",
            Self::DeleteObject => "delete_object",
            Self::SelectObject => "select_object",
            Self::ListObjects => "list_objects",
        }
    }

    /// Looks up a wire name. Returns `None` for grammar lines.
    #[must_use]
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.as_str() == name)
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully validated grammar command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create a primitive with random placement and color.
    Create {
        /// Primitive kind.
        shape: Shape,
        /// Object name (lowercased).
        name: String,
    },
    /// Delete an object by name.
    Delete {
        /// Object name (lowercased).
        name: String,
    },
    /// Select an object by name.
    Select {
        /// Object name (lowercased).
        name: String,
    },
    /// List every object.
    List,
}

impl Command {
    /// Parses one input line.
    ///
    /// # Errors
    ///
    /// - [`RelayError::InvalidVerb`] for an unknown (or empty) verb.
    /// - [`RelayError::Usage`] when required operands are missing.
    /// - [`RelayError::InvalidShape`] for an unknown shape in `create`.
    pub fn parse(line: &str) -> Result<Self, RelayError> {
        let lowered = line.trim().to_lowercase();
        let mut tokens = lowered.split_whitespace();
        let verb: Verb = tokens.next().unwrap_or_default().parse()?;

        match verb {
            Verb::Create => {
                let (Some(shape), Some(name)) = (tokens.next(), tokens.next()) else {
                    return Err(RelayError::Usage(
                        "Usage: create [shape] [name]".to_string(),
                    ));
                };
                Ok(Self::Create {
                    shape: shape.parse()?,
                    name: name.to_string(),
                })
            }
            Verb::Delete => {
                let name = tokens
                    .next()
                    .ok_or_else(|| RelayError::Usage("Usage: delete [name]".to_string()))?;
                Ok(Self::Delete {
                    name: name.to_string(),
                })
            }
            Verb::Select => {
                let name = tokens
                    .next()
                    .ok_or_else(|| RelayError::Usage("Usage: select [name]".to_string()))?;
                Ok(Self::Select {
                    name: name.to_string(),
                })
            }
            Verb::List => Ok(Self::List),
        }
    }

    /// Returns the verb this command was parsed from.
    #[must_use]
    pub const fn verb(&self) -> Verb {
        match self {
            Self::Create { .. } => Verb::Create,
            Self::Delete { .. } => Verb::Delete,
            Self::Select { .. } => Verb::Select,
            Self::List => Verb::List,
        }
    }
}
