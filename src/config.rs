/*!
Structs to hold configuration data and global variables.
*/
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{
    accounts::Accounts,
    auth::KeyRing,
    notify::{LogNotifier, MailNotifier, Notifier},
    pairing::Pairing,
    registry::Registry,
    store::{mem::MemStore, pg::PgStore, Store},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Storage {
    Postgres,
    Memory,
}

#[derive(Deserialize)]
struct ConfigFile {
    storage: Option<Storage>,
    db_connect_string: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    mailer_url: Option<String>,
    template_dir: Option<PathBuf>,
    key_life_hours: Option<i64>,
}

#[derive(Debug)]
pub struct Cfg {
    pub storage: Storage,
    pub db_connect_string: String,
    pub addr: SocketAddr,
    /// Where to `POST` outgoing mail. Without one, notices are only logged.
    pub mailer_url: Option<String>,
    pub template_dir: Option<PathBuf>,
    pub key_life_hours: i64,
}

impl std::default::Default for Cfg {
    fn default() -> Self {
        Self {
            storage: Storage::Postgres,
            db_connect_string: "host=localhost user=hw_test password='hw_test' dbname=hw_test".to_owned(),
            addr: SocketAddr::from(([0, 0, 0, 0], 8001)),
            mailer_url: None,
            template_dir: None,
            key_life_hours: 72,
        }
    }
}

impl Cfg {
    pub fn from_toml(text: &str) -> Result<Self, String> {
        let cf: ConfigFile = toml::from_str(text)
            .map_err(|e| format!("Unable to deserialize config file: {}", &e))?;

        let mut c = Self::default();

        if let Some(s) = cf.storage {
            c.storage = s;
        }
        if let Some(s) = cf.db_connect_string {
            c.db_connect_string = s;
        }
        if let Some(s) = cf.host {
            c.addr.set_ip(
                s.parse().map_err(|e| format!(
                    "Error parsing {:?} as IP address: {}",
                    &s, &e
                ))?
            );
        }
        if let Some(n) = cf.port {
            c.addr.set_port(n);
        }
        if let Some(s) = cf.mailer_url {
            c.mailer_url = Some(s);
        }
        if let Some(p) = cf.template_dir {
            c.template_dir = Some(p);
        }
        if let Some(n) = cf.key_life_hours {
            if n < 1 {
                return Err(format!("key_life_hours must be at least 1, not {}.", n));
            }
            c.key_life_hours = n;
        }

        Ok(c)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let file_contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Unable to read config file: {}", &e))?;
        Self::from_toml(&file_contents)
    }
}

/**
This guy hauls around the store, the notifier, and the issued session keys,
and gets passed in an `axum::Extension` to the handlers who need him.

The core services are cheap views over these; make a fresh one per request.
*/
pub struct Glob {
    pub store: Box<dyn Store>,
    pub notifier: Box<dyn Notifier>,
    pub keys: KeyRing,
    pub addr: SocketAddr,
}

impl Glob {
    pub fn registry(&self) -> Registry<'_> {
        Registry::new(self.store.as_ref(), self.notifier.as_ref())
    }

    pub fn pairing(&self) -> Pairing<'_> {
        Pairing::new(self.store.as_ref())
    }

    pub fn accounts(&self) -> Accounts<'_> {
        Accounts::new(self.store.as_ref(), self.notifier.as_ref())
    }
}

/// Loads system configuration and ensures all appropriate database tables
/// exist.
pub async fn load_configuration<P: AsRef<Path>>(path: P) -> Result<Glob, String> {
    let cfg = Cfg::from_file(path.as_ref())?;
    log::info!("Configuration file read:\n{:#?}", &cfg);

    let store: Box<dyn Store> = match cfg.storage {
        Storage::Postgres => Box::new(PgStore::new(cfg.db_connect_string.clone())),
        Storage::Memory => {
            log::warn!("Using in-memory storage; nothing will outlive this process.");
            Box::new(MemStore::new())
        },
    };

    log::trace!("Checking state of DB...");
    if let Err(e) = store.ensure_db_schema().await {
        let estr = format!("Unable to ensure state of DB: {}", &e);
        return Err(estr);
    }
    log::trace!("...DB okay.");

    let notifier: Box<dyn Notifier> = match cfg.mailer_url {
        Some(url) => {
            log::info!("Relaying mail through {}.", &url);
            Box::new(MailNotifier::new(url, cfg.template_dir.as_deref())?)
        },
        None => {
            log::warn!("No mailer_url configured; notices will only be logged.");
            Box::new(LogNotifier)
        },
    };

    let glob = Glob {
        store,
        notifier,
        keys: KeyRing::new(time::Duration::hours(cfg.key_life_hours)),
        addr: cfg.addr,
    };

    Ok(glob)
}
