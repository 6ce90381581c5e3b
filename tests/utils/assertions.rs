//! Test assertion helpers - fluent API for verifying stored accounts
#![allow(dead_code)] // Test utilities may not all be used in every test

use ksoccer::user::AccountModel;

use super::setup::TestSetup;

// ============================================================================
// Assertion Helpers
// ============================================================================

pub struct AccountAssertion {
    account: AccountModel,
}

impl AccountAssertion {
    /// Load the stored account for a handle, failing the test when absent
    pub async fn for_handle(setup: &TestSetup, handle: &str) -> Self {
        let tables = setup.database.read().await;
        let account = tables
            .account_by_handle(handle)
            .cloned()
            .unwrap_or_else(|| panic!("no account stored for handle '{}'", handle));
        Self { account }
    }

    pub fn has_goals(self, expected: i64) -> Self {
        assert_eq!(self.account.goals, expected, "goals of {}", self.account.handle);
        self
    }

    pub fn has_assists(self, expected: i64) -> Self {
        assert_eq!(self.account.assists, expected, "assists of {}", self.account.handle);
        self
    }

    pub fn has_kcoins(self, expected: i64) -> Self {
        assert_eq!(self.account.kcoins, expected, "kcoins of {}", self.account.handle);
        self
    }

    pub fn has_matches_played(self, expected: i64) -> Self {
        assert_eq!(
            self.account.matches_played, expected,
            "matches played by {}",
            self.account.handle
        );
        self
    }

    pub fn is_provisional(self) -> Self {
        assert!(!self.account.is_active, "{} should be inactive", self.account.handle);
        assert!(
            !self.account.has_usable_credential(),
            "{} should have no credential",
            self.account.handle
        );
        self
    }

    pub fn is_active(self) -> Self {
        assert!(self.account.is_active, "{} should be active", self.account.handle);
        self
    }
}
