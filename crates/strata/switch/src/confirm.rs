//! Interactive confirmation
//!
//! Confirming a switch means typing the target environment's name back
//! exactly. Anything else, including no answer, declines.

use std::collections::VecDeque;

use parking_lot::Mutex;

/// Source of confirmation answers.
pub trait Confirmer: Send + Sync {
    /// Ask the operator to echo `environment`. `None` means no answer.
    fn prompt(&self, environment: &str) -> Option<String>;
}

/// Prompts on the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct DialoguerConfirmer;

impl Confirmer for DialoguerConfirmer {
    fn prompt(&self, environment: &str) -> Option<String> {
        dialoguer::Input::<String>::new()
            .with_prompt(format!(
                "Switching to '{}'. Type the environment name to confirm",
                environment
            ))
            .allow_empty(true)
            .interact_text()
            .ok()
    }
}

/// Answers from a fixed queue, then declines.
#[derive(Debug, Default)]
pub struct ScriptedConfirmer {
    answers: Mutex<VecDeque<String>>,
}

impl ScriptedConfirmer {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
        }
    }

    pub fn remaining(&self) -> usize {
        self.answers.lock().len()
    }
}

impl Confirmer for ScriptedConfirmer {
    fn prompt(&self, _environment: &str) -> Option<String> {
        self.answers.lock().pop_front()
    }
}

/// Declines every confirmation. Used when no terminal is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyConfirmer;

impl Confirmer for DenyConfirmer {
    fn prompt(&self, _environment: &str) -> Option<String> {
        None
    }
}

/// True if the answer is exactly the environment name.
pub fn is_confirmed(environment: &str, answer: Option<&str>) -> bool {
    answer == Some(environment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_echo_required() {
        assert!(is_confirmed("staging", Some("staging")));
        assert!(!is_confirmed("staging", Some("Staging")));
        assert!(!is_confirmed("staging", Some("staging ")));
        assert!(!is_confirmed("staging", None));
    }

    #[test]
    fn test_scripted_answers_run_out() {
        let confirmer = ScriptedConfirmer::new(["staging"]);
        assert_eq!(confirmer.prompt("staging").as_deref(), Some("staging"));
        assert_eq!(confirmer.remaining(), 0);
        assert_eq!(confirmer.prompt("staging"), None);
        assert_eq!(DenyConfirmer.prompt("staging"), None);
    }
}
