//! Quiz challenges used to arbitrate contested squares.

use std::path::Path;
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

const BUILTIN_CHALLENGES: &str = include_str!("../../assets/challenges.json");

#[derive(thiserror::Error, Debug)]
pub enum ChallengeError {
    #[error("failed to read challenge file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid challenge json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("challenge pool is empty")]
    Empty,
    #[error("challenge #{index} ('{question}') is malformed: {reason}")]
    Invalid {
        index: usize,
        question: String,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub question: String,
    pub answers: Vec<String>,
    pub answer_key: usize,
}

impl Challenge {
    /// Permutes the answers in place, keeping `answer_key` on the correct one.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for i in (1..self.answers.len()).rev() {
            let j = rng.gen_range(0..=i);
            self.answers.swap(i, j);
            if self.answer_key == i {
                self.answer_key = j;
            } else if self.answer_key == j {
                self.answer_key = i;
            }
        }
    }

    /// `-1` and any other out-of-range index count as a wrong answer.
    pub fn is_correct(&self, answer: i64) -> bool {
        usize::try_from(answer).is_ok_and(|a| a == self.answer_key)
    }

    fn validate(&self, index: usize) -> Result<(), ChallengeError> {
        let reason = if self.answers.len() < 2 {
            "needs at least two answers"
        } else if self.answer_key >= self.answers.len() {
            "answer_key is out of range"
        } else {
            return Ok(());
        };
        Err(ChallengeError::Invalid {
            index,
            question: self.question.clone(),
            reason,
        })
    }
}

/// Immutable, validated set of challenges shared by every room.
#[derive(Debug, Clone)]
pub struct ChallengePool {
    challenges: Arc<[Challenge]>,
}

impl ChallengePool {
    pub fn new(challenges: Vec<Challenge>) -> Result<Self, ChallengeError> {
        if challenges.is_empty() {
            return Err(ChallengeError::Empty);
        }
        for (i, c) in challenges.iter().enumerate() {
            c.validate(i)?;
        }
        Ok(Self {
            challenges: challenges.into(),
        })
    }

    pub fn from_json(json: &str) -> Result<Self, ChallengeError> {
        Self::new(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ChallengeError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// The question set compiled into the binary.
    pub fn builtin() -> Result<Self, ChallengeError> {
        Self::from_json(BUILTIN_CHALLENGES)
    }

    pub fn len(&self) -> usize {
        self.challenges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.challenges.is_empty()
    }
}

/// Draws from a pool without repeating a question until every one has been
/// asked.
#[derive(Debug, Clone)]
pub struct ChallengeDeck {
    pool: ChallengePool,
    asked: Vec<bool>,
}

impl ChallengeDeck {
    pub fn new(pool: ChallengePool) -> Self {
        let asked = vec![false; pool.len()];
        Self { pool, asked }
    }

    /// Returns a shuffled copy of an unasked challenge.
    pub fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Challenge {
        if self.asked.iter().all(|a| *a) {
            self.asked.fill(false);
        }
        let fresh: Vec<usize> = (0..self.asked.len()).filter(|i| !self.asked[*i]).collect();
        let pick = fresh[rng.gen_range(0..fresh.len())];
        self.asked[pick] = true;

        let mut challenge = self.pool.challenges[pick].clone();
        challenge.shuffle(rng);
        challenge
    }
}
