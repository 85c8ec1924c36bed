use std::path::{Path, PathBuf};

use crate::models::Client;
use crate::store::{self, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Registered,
    /// Phone was known already; the stored name is kept.
    AlreadyExists,
}

/// Phone → client name, first write wins.
#[derive(Debug)]
pub struct ClientRegistry {
    path: PathBuf,
    clients: Vec<Client>,
}

impl ClientRegistry {
    pub async fn load_or_create(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let clients = store::load(&path).await?;
        Ok(Self { path, clients })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn clients(&self) -> &[Client] {
        &self.clients
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn lookup(&self, phone: &str) -> Option<&Client> {
        let phone = phone.trim();
        self.clients.iter().find(|c| c.phone == phone)
    }

    /// Record a new client. Known phones are left untouched and nothing is written.
    pub async fn register(&mut self, phone: &str, name: &str) -> Result<Registration, StoreError> {
        if self.lookup(phone).is_some() {
            return Ok(Registration::AlreadyExists);
        }

        self.clients.push(Client {
            phone: phone.trim().to_string(),
            name: name.trim().to_string(),
            notes: String::new(),
        });
        if let Err(e) = store::persist(&self.path, &self.clients).await {
            self.clients.pop();
            return Err(e);
        }
        Ok(Registration::Registered)
    }
}
