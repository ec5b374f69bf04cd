use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::language::Language;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    Array,
    String,
    Tree,
    Graph,
    #[serde(rename = "dynamic programming")]
    DynamicProgramming,
    Greedy,
    Backtracking,
    Stack,
    Queue,
    Heap,
    #[serde(rename = "linked list")]
    LinkedList,
    Math,
    #[serde(rename = "bit manipulation")]
    BitManipulation,
    Recursion,
    #[serde(rename = "hash table")]
    HashTable,
    #[serde(rename = "sliding window")]
    SlidingWindow,
    #[serde(rename = "two pointers")]
    TwoPointers,
    #[serde(rename = "binary search")]
    BinarySearch,
    Sorting,
    #[serde(rename = "divide and conquer")]
    DivideAndConquer,
}

/// An input with its expected output. Visible cases carry an explanation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub input: String,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl TestCase {
    pub fn visible(
        input: impl Into<String>,
        output: impl Into<String>,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            explanation: Some(explanation.into()),
        }
    }

    pub fn hidden(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            explanation: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StartCode {
    pub language: Language,
    pub initial_code: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSolution {
    pub language: Language,
    pub solution: String,
}

/// Everything an administrator provides when creating or replacing a problem.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProblemDraft {
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub tags: Vec<Tag>,
    pub visible_test_cases: Vec<TestCase>,
    pub hidden_test_cases: Vec<TestCase>,
    #[serde(default)]
    pub start_code: Vec<StartCode>,
    #[serde(default)]
    pub reference_solution: Vec<ReferenceSolution>,
}

impl ProblemDraft {
    /// Checks the constraints serde cannot express. Returns a message
    /// suitable for the client on failure.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Title must not be empty".to_string());
        }
        if self.description.trim().is_empty() {
            return Err("Description must not be empty".to_string());
        }
        if self.tags.is_empty() {
            return Err("At least one tag is required".to_string());
        }
        if self.visible_test_cases.is_empty() {
            return Err("At least one visible test case is required".to_string());
        }
        if self.hidden_test_cases.is_empty() {
            return Err("At least one hidden test case is required".to_string());
        }
        if let Some(i) = self
            .visible_test_cases
            .iter()
            .position(|c| c.explanation.as_deref().is_none_or(|e| e.trim().is_empty()))
        {
            return Err(format!("Visible test case {i} needs an explanation"));
        }

        let mut seen = HashSet::new();
        if let Some(dup) = self.start_code.iter().find(|s| !seen.insert(s.language)) {
            return Err(format!("Duplicate start code for {}", dup.language));
        }
        seen.clear();
        if let Some(dup) = self
            .reference_solution
            .iter()
            .find(|s| !seen.insert(s.language))
        {
            return Err(format!("Duplicate reference solution for {}", dup.language));
        }

        Ok(())
    }

    /// Drops explanations from hidden cases, they are never shown.
    pub fn normalized(mut self) -> Self {
        for case in &mut self.hidden_test_cases {
            case.explanation = None;
        }
        self
    }
}

/// A stored problem, hidden cases included.
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    pub id: i64,
    pub creator_id: i64,
    pub draft: ProblemDraft,
    pub created_time: String,
    pub updated_time: String,
}

/// What users see of a problem: no hidden cases, no creator.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProblemDetail {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub tags: Vec<Tag>,
    pub visible_test_cases: Vec<TestCase>,
    pub start_code: Vec<StartCode>,
    pub reference_solution: Vec<ReferenceSolution>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProblemSummary {
    pub id: i64,
    pub title: String,
    pub difficulty: Difficulty,
    pub tags: Vec<Tag>,
}

impl Problem {
    pub fn detail(&self) -> ProblemDetail {
        let draft = self.draft.clone();
        ProblemDetail {
            id: self.id,
            title: draft.title,
            description: draft.description,
            difficulty: draft.difficulty,
            tags: draft.tags,
            visible_test_cases: draft.visible_test_cases,
            start_code: draft.start_code,
            reference_solution: draft.reference_solution,
        }
    }
}
