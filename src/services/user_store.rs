//! User store: credentials from the HIS staff export CSV, privileged role
//! from a JSON allowlist of super-user emails.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;

use crate::models::{UserInfo, UserRole};

#[derive(Debug, Deserialize)]
struct UserRecord {
    #[serde(rename = "E-mail", default)]
    email: String,
    #[serde(rename = "NAME", default)]
    name: String,
    #[serde(rename = "ID", default)]
    id: String,
    #[serde(rename = "Department", default)]
    department: String,
}

#[derive(Debug, Deserialize)]
struct SuperUserFile {
    #[serde(default)]
    super_users: Vec<String>,
}

#[derive(Debug, Clone)]
struct StoredUser {
    name: String,
    id: String,
    department: String,
}

#[derive(Default)]
pub struct UserStore {
    users: HashMap<String, StoredUser>,
    super_users: HashSet<String>,
}

impl UserStore {
    /// Load users and the super-user list. Missing files degrade to an
    /// empty store with an error log; the service still boots so the
    /// operator can see the problem in /api/health checks and logs.
    pub fn load(csv_path: &Path, super_users_path: &Path) -> Self {
        let mut store = Self::default();
        store.load_users(csv_path);
        store.load_super_users(super_users_path);
        store
    }

    fn load_users(&mut self, csv_path: &Path) {
        if !csv_path.exists() {
            tracing::error!("Users CSV not found: {}", csv_path.display());
            return;
        }

        let reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(csv_path);
        let mut reader = match reader {
            Ok(reader) => reader,
            Err(e) => {
                tracing::error!("Failed to open users CSV {}: {}", csv_path.display(), e);
                return;
            },
        };

        for record in reader.deserialize::<UserRecord>() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!("Skipping malformed user record: {}", e);
                    continue;
                },
            };

            let email = record.email.trim().to_lowercase();
            if email.is_empty() {
                continue;
            }

            self.users.insert(
                email,
                StoredUser {
                    name: record.name.trim().to_string(),
                    id: record.id.trim().to_string(),
                    department: record.department.trim().to_string(),
                },
            );
        }

        tracing::info!("Loaded {} users from CSV", self.users.len());
    }

    fn load_super_users(&mut self, path: &Path) {
        if !path.exists() {
            tracing::warn!("Super users file not found: {}", path.display());
            return;
        }

        match std::fs::read_to_string(path)
            .map_err(anyhow::Error::from)
            .and_then(|content| Ok(serde_json::from_str::<SuperUserFile>(&content)?))
        {
            Ok(parsed) => {
                self.super_users =
                    parsed.super_users.iter().map(|e| e.trim().to_lowercase()).collect();
                tracing::info!("Loaded {} super users", self.super_users.len());
            },
            Err(e) => {
                tracing::error!("Failed to load super users: {}", e);
            },
        }
    }

    /// Verify credentials. Returns the user with their role, or None.
    pub fn verify(&self, email: &str, password: &str) -> Option<UserInfo> {
        let email_lower = email.trim().to_lowercase();
        let user = self.users.get(&email_lower)?;

        if user.id != password.trim() {
            return None;
        }

        let role = if self.super_users.contains(&email_lower) {
            UserRole::SuperUser
        } else {
            UserRole::StandardUser
        };

        Some(UserInfo {
            email: email_lower,
            name: user.name.clone(),
            department: user.department.clone(),
            role,
        })
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}
