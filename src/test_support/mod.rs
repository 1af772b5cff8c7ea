//! Test utilities and mocks for nuconvert unit tests.
//!
//! The conversion talks to the outside world through three seams: the
//! operator [`Prompt`], the platform [`CredentialDecryptor`] and the
//! [`CredentialStore`]. This module provides scripted stand-ins for each,
//! plus on-disk repository fixtures.
//!
//! # Example
//!
//! ```rust,ignore
//! use nuconvert::test_support::{legacy_repo, FailingPrompt, ReversingDecryptor};
//!
//! #[test]
//! fn test_example() {
//!     let repo = legacy_repo();
//!     let options = ConvertOptions::new(repo.root());
//!     let state = convert(&options, &ReversingDecryptor, &FailingPrompt).unwrap();
//! }
//! ```

pub mod fixtures;

use std::cell::RefCell;
use std::collections::VecDeque;

use anyhow::{bail, Result};

use crate::sources::credentials::{CredentialDecryptor, CredentialStore, Prompt, SourceAuth};

pub use fixtures::*;

/// A prompt nobody can answer, like a CI job without a terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingPrompt;

impl Prompt for FailingPrompt {
    fn confirm(&self, _question: &str) -> Result<bool> {
        bail!("no terminal attached")
    }
}

/// A prompt that replays canned answers and records the questions.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: RefCell<VecDeque<bool>>,
    questions: RefCell<Vec<String>>,
}

impl ScriptedPrompt {
    pub fn new(answers: Vec<bool>) -> Self {
        ScriptedPrompt {
            answers: RefCell::new(answers.into()),
            questions: RefCell::new(Vec::new()),
        }
    }

    /// Questions asked so far, in order.
    pub fn questions(&self) -> Vec<String> {
        self.questions.borrow().clone()
    }
}

impl Prompt for ScriptedPrompt {
    fn confirm(&self, question: &str) -> Result<bool> {
        self.questions.borrow_mut().push(question.to_string());
        match self.answers.borrow_mut().pop_front() {
            Some(answer) => Ok(answer),
            None => bail!("unexpected question: {}", question),
        }
    }
}

/// "Decrypts" by reversing the input, so tests can tell decrypted values
/// from the stored ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReversingDecryptor;

impl CredentialDecryptor for ReversingDecryptor {
    fn decrypt(&self, encrypted: &str) -> Result<String> {
        Ok(encrypted.chars().rev().collect())
    }
}

/// Credential store that keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    pub stored: Vec<(String, SourceAuth)>,
}

impl CredentialStore for MemoryCredentialStore {
    fn store(&mut self, source: &str, auth: &SourceAuth) -> Result<()> {
        self.stored.retain(|(s, _)| s != source);
        self.stored.push((source.to_string(), auth.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_prompt_replays_answers() {
        let prompt = ScriptedPrompt::new(vec![true, false]);

        assert!(prompt.confirm("first?").unwrap());
        assert!(!prompt.confirm("second?").unwrap());
        assert!(prompt.confirm("third?").is_err());
        assert_eq!(prompt.questions(), vec!["first?", "second?", "third?"]);
    }

    #[test]
    fn test_legacy_repo_layout() {
        let repo = legacy_repo();

        assert!(repo.exists("App.sln"));
        assert!(repo.exists(".nuget/NuGet.exe"));
        assert!(repo.read("src/Lib/packages.config").contains("7.0.1"));
    }
}
