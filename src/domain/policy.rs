use serde::{Deserialize, Serialize};

/// Whether an unconfirmed order whose deadline has not passed yet counts as
/// handled at the end of a sweep.
///
/// `Unhandled` reproduces the strict behaviour where any still-waiting order
/// makes the sweep report a partial failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WaitingPolicy {
    #[default]
    Handled,
    Unhandled,
}

impl WaitingPolicy {
    pub fn counts_as_handled(self) -> bool {
        matches!(self, WaitingPolicy::Handled)
    }
}

/// Which party's external id comes first in a synthesized order identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdentifierOrder {
    #[default]
    DonorFirst,
    CharityFirst,
}

impl IdentifierOrder {
    pub fn arrange<'a>(self, donor: &'a str, charity: &'a str) -> (&'a str, &'a str) {
        match self {
            IdentifierOrder::DonorFirst => (donor, charity),
            IdentifierOrder::CharityFirst => (charity, donor),
        }
    }
}
