//! ## portvakt-detection::matcher
//! **Failure marker detection and source address extraction**
//!
//! The failure marker is a literal found with Aho-Corasick; only frames that
//! contain it pay for the address regex. Capture header lines look like
//!
//! ```text
//! 12:00:01.000 IP 192.168.1.10.81 > 10.0.0.5.51514: Flags [P.], ...
//! ```
//!
//! and the second address of the pair is reported as the offending source.

use std::net::IpAddr;

use aho_corasick::AhoCorasick;
use portvakt_config::DetectionConfig;
use regex::Regex;
use tracing::debug;

use crate::error::DetectionError;
use crate::frame::Frame;

/// `IP <addr1>.<port> > <addr2>.<port>`, ASCII digits only.
pub const ADDRESS_PAIR_PATTERN: &str =
    r"IP\s([0-9]+\.[0-9]+\.[0-9]+\.[0-9]+)\.[0-9]+\s>\s([0-9]+\.[0-9]+\.[0-9]+\.[0-9]+)\.[0-9]+";

/// What a frame says about authentication failures. Never stored.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatchResult {
    pub has_failure_marker: bool,
    pub source_address: Option<String>,
}

impl MatchResult {
    /// The address to count, if the frame is an actionable failure.
    pub fn actionable_address(self) -> Option<String> {
        if self.has_failure_marker {
            self.source_address
        } else {
            None
        }
    }
}

pub struct FailureMatcher {
    failure_marker: AhoCorasick,
    address_pair: Regex,
}

impl FailureMatcher {
    pub fn new(failure_marker: &str) -> Result<Self, DetectionError> {
        if failure_marker.is_empty() {
            return Err(DetectionError::EmptyMarker("failure"));
        }
        let failure_marker = AhoCorasick::new([failure_marker])
            .map_err(|e| DetectionError::PatternError(e.to_string()))?;
        let address_pair = Regex::new(ADDRESS_PAIR_PATTERN)
            .map_err(|e| DetectionError::PatternError(e.to_string()))?;

        Ok(Self {
            failure_marker,
            address_pair,
        })
    }

    pub fn from_config(config: &DetectionConfig) -> Result<Self, DetectionError> {
        Self::new(&config.failure_marker)
    }

    /// Scan a completed frame.
    #[inline]
    pub fn inspect(&self, frame: &Frame) -> MatchResult {
        let text = frame.as_str();
        if !self.failure_marker.is_match(text) {
            return MatchResult::default();
        }

        let source_address = self
            .address_pair
            .captures(text)
            .and_then(|caps| caps.get(2))
            .map(|m| m.as_str())
            .filter(|candidate| candidate.parse::<IpAddr>().is_ok())
            .map(str::to_string);

        if source_address.is_none() {
            debug!(
                frame_bytes = text.len(),
                "Failure marker without a recognisable address pair"
            );
        }

        MatchResult {
            has_failure_marker: true,
            source_address,
        }
    }
}
