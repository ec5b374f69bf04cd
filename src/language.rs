use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::judge::EvalError;

/// Languages accepted by problem authoring and submissions.
///
/// Each variant maps to exactly one language id in the execution service's
/// registry, see [`Language::judge_id`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[sqlx(rename = "c")]
    C,
    #[serde(rename = "c++")]
    #[sqlx(rename = "c++")]
    Cpp,
    #[sqlx(rename = "java")]
    Java,
    #[sqlx(rename = "javascript")]
    Javascript,
    #[sqlx(rename = "python")]
    Python,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::C,
        Language::Cpp,
        Language::Java,
        Language::Javascript,
        Language::Python,
    ];

    /// Language id in the Judge0 CE registry
    pub fn judge_id(self) -> u32 {
        match self {
            Language::C => 50,
            Language::Cpp => 54,
            Language::Java => 62,
            Language::Javascript => 63,
            Language::Python => 71,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cpp => "c++",
            Language::Java => "java",
            Language::Javascript => "javascript",
            Language::Python => "python",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves a language name as sent by clients. Names outside the closed
/// set fail with [`EvalError::Resolution`].
impl FromStr for Language {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::ALL
            .into_iter()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| EvalError::Resolution(s.to_string()))
    }
}
