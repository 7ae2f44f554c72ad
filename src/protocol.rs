//! Line protocol spoken on the light's control port.
//!
//! Commands are single lines. The device echoes the command, answers with a
//! status line starting with `OK` on success, and finishes with a `>` prompt.
//! [`Reply`] tokenizes a raw exchange into just the payload words.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Byte that terminates every device reply.
pub const PROMPT: u8 = b'>';

/// Token the device includes in replies to accepted commands.
pub const SUCCESS_TOKEN: &str = "OK";

/// Command returning the wavelength label of each channel.
pub const GET_WAVELENGTHS: &str = "getWl";

/// Command returning the current relative power of each channel.
pub const GET_RELATIVE_POWER: &str = "getAllRelPower";

/// Command applying relative power levels across all channels.
pub const SET_RELATIVE_POWER: &str = "setWlsRelPower";

static TOKEN_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w+\b").unwrap());

#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The device reply had no success token. Carries the trimmed reply text.
    #[error("{0}")]
    CommandFailed(String),
    #[error("bad integer token '{token}' in reply to {command}")]
    BadInteger { command: String, token: String },
}

/// A successful device reply, reduced to its payload tokens.
#[derive(Debug)]
pub struct Reply {
    command: String,
    tokens: Vec<String>,
}

impl Reply {
    /// Tokenize the raw text of an exchange for `command`.
    ///
    /// Fails unless the reply contains [`SUCCESS_TOKEN`]. The echoed command
    /// name and the success token are stripped, leaving payload words only.
    pub fn parse(command: &str, raw: &str) -> Result<Self, ProtocolError> {
        if !raw.contains(SUCCESS_TOKEN) {
            return Err(ProtocolError::CommandFailed(raw.trim().to_string()));
        }

        let name = command.split_whitespace().next().unwrap_or(command);
        let mut tokens: Vec<String> = TOKEN_REGEX
            .find_iter(raw)
            .map(|m| m.as_str().to_string())
            .collect();

        // The echo repeats the full command line, so drop the leading name
        // and any echoed arguments up to the success token.
        if tokens.first().is_some_and(|t| t == name) {
            tokens.remove(0);
            while let Some(first) = tokens.first() {
                if first == SUCCESS_TOKEN {
                    break;
                }
                tokens.remove(0);
            }
        }
        if tokens.first().is_some_and(|t| t == SUCCESS_TOKEN) {
            tokens.remove(0);
        }

        Ok(Self {
            command: command.to_string(),
            tokens,
        })
    }

    /// Payload tokens as words.
    pub fn words(&self) -> &[String] {
        &self.tokens
    }

    /// Payload tokens parsed as integers.
    pub fn integers(&self) -> Result<Vec<i64>, ProtocolError> {
        self.tokens
            .iter()
            .map(|token| {
                token.parse().map_err(|_| ProtocolError::BadInteger {
                    command: self.command.clone(),
                    token: token.clone(),
                })
            })
            .collect()
    }

    pub fn into_words(self) -> Vec<String> {
        self.tokens
    }
}

/// Build the command line applying `levels` across the light's channels.
pub fn set_power_command(levels: &[u16]) -> String {
    let mut command = String::from(SET_RELATIVE_POWER);
    for level in levels {
        command.push(' ');
        command.push_str(&level.to_string());
    }
    command
}
