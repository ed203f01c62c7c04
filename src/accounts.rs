/*!
Registering, logging in, looking at, and deleting accounts.

Deleting an account cascades: a teacher's students are unpaired and the
homework they authored is removed; a student's assigned homework is
removed. The cascade is best effort. Once the account itself is gone the
deletion counts as done, and anything that fails afterward is only logged.
*/
use serde::Serialize;

use crate::{
    auth,
    error::HwError,
    notify::Notifier,
    pairing::Pairing,
    registry::Registry,
    store::Store,
    user::{Account, Actor, NewAccount, Role, Student, Teacher},
};

pub const MAX_NAME_CHARS: usize = 100;
pub const MAX_PASSWORD_CHARS: usize = 30;

/// What an account holder sees about themselves and their counterparts.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Profile {
    Teacher {
        teacher: Teacher,
        students: Vec<Student>,
    },
    /// `teachers` lists who there is to pair with, and is empty once paired.
    Student {
        student: Student,
        teacher: Option<Teacher>,
        teachers: Vec<Teacher>,
    },
}

fn validate_email(email: &str) -> Result<(), HwError> {
    let (user, domain) = match email.split_once('@') {
        Some(parts) => parts,
        None => { return Err(HwError::invalid("Email address must contain an @.")); },
    };
    if user.is_empty() || domain.is_empty()
        || domain.contains('@') || email.chars().any(char::is_whitespace)
    {
        return Err(HwError::invalid(format!("{:?} is not a valid email address.", email)));
    }
    Ok(())
}

fn validate_registration(email: &str, name: &str, password: &str) -> Result<(), HwError> {
    validate_email(email)?;
    if name.trim().is_empty() {
        return Err(HwError::invalid("Name cannot be blank."));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(HwError::invalid(format!(
            "Name cannot be longer than {} characters.", MAX_NAME_CHARS
        )));
    }
    if password.is_empty() {
        return Err(HwError::invalid("Password cannot be empty."));
    }
    if password.chars().count() > MAX_PASSWORD_CHARS {
        return Err(HwError::invalid(format!(
            "Password cannot be longer than {} characters.", MAX_PASSWORD_CHARS
        )));
    }
    Ok(())
}

pub struct Accounts<'a> {
    store: &'a dyn Store,
    notifier: &'a dyn Notifier,
}

impl<'a> Accounts<'a> {
    pub fn new(store: &'a dyn Store, notifier: &'a dyn Notifier) -> Self {
        Self { store, notifier }
    }

    async fn find(&self, role: Role, email: &str) -> Result<Option<Account>, HwError> {
        let acct = match role {
            Role::Teacher => self.store.get_teacher_by_email(email).await?.map(Account::Teacher),
            Role::Student => self.store.get_student_by_email(email).await?.map(Account::Student),
        };
        Ok(acct)
    }

    pub async fn register(
        &self,
        role: Role,
        email: &str,
        name: &str,
        password: &str,
    ) -> Result<Account, HwError> {
        log::trace!("Accounts::register( {}, {:?}, {:?}, [ password ] ) called.", &role, email, name);

        validate_registration(email, name, password)?;

        if self.find(role, email).await?.is_some() {
            return Err(HwError::Conflict(format!(
                "A {} with email {:?} already exists.", &role, email
            )));
        }

        let salt = auth::generate_salt();
        let new = NewAccount {
            email: email.to_owned(),
            name: name.trim().to_owned(),
            password_hash: auth::hash_password(password, &salt),
            salt,
        };

        // Somebody may have registered the same email since the check above.
        let inserted = match role {
            Role::Teacher => self.store.insert_teacher(&new).await.map(Account::Teacher),
            Role::Student => self.store.insert_student(&new).await.map(Account::Student),
        };
        let acct = match inserted {
            Ok(acct) => acct,
            Err(e) if e.is_duplicate() => {
                log::debug!("Lost registration race for {} {:?}: {}", &role, email, &e);
                return Err(HwError::Conflict(format!(
                    "A {} with email {:?} already exists.", &role, email
                )));
            },
            Err(e) => { return Err(e.into()); },
        };
        log::info!("Registered {} {} ({}).", &role, acct.id(), acct.email());
        Ok(acct)
    }

    /// The account matching all three of `role`, `email`, and `password`.
    ///
    /// Whether it's the account or the password that's wrong is not revealed.
    pub async fn login(&self, role: Role, email: &str, password: &str) -> Result<Account, HwError> {
        log::trace!("Accounts::login( {}, {:?}, [ password ] ) called.", &role, email);

        let acct = match self.find(role, email).await? {
            Some(acct) => acct,
            None => {
                log::debug!("Login attempt for nonexistent {} {:?}.", &role, email);
                return Err(HwError::BadCredentials);
            },
        };

        if auth::check_password(password, acct.salt(), acct.password_hash()) {
            Ok(acct)
        } else {
            log::debug!("Bad password for {} {:?}.", &role, email);
            Err(HwError::BadCredentials)
        }
    }

    pub async fn profile(&self, actor: &Actor) -> Result<Profile, HwError> {
        log::trace!("Accounts::profile( {:?} ) called.", actor);

        let pairing = Pairing::new(self.store);

        match actor.role {
            Role::Teacher => {
                let teacher = match self.store.get_teacher(actor.id).await? {
                    Some(t) => t,
                    None => {
                        return Err(HwError::not_found(format!("There is no teacher with id {}.", actor.id)));
                    },
                };
                let students = pairing.students_of(actor.id).await?;
                Ok(Profile::Teacher { teacher, students })
            },
            Role::Student => {
                let student = match self.store.get_student(actor.id).await? {
                    Some(s) => s,
                    None => {
                        return Err(HwError::not_found(format!("There is no student with id {}.", actor.id)));
                    },
                };
                let teacher = pairing.teacher_of(actor.id).await?;
                let teachers = match teacher {
                    Some(_) => Vec::new(),
                    None => self.store.get_teachers().await?,
                };
                Ok(Profile::Student { student, teacher, teachers })
            },
        }
    }

    pub async fn delete_teacher(&self, id: i64) -> Result<(), HwError> {
        log::trace!("Accounts::delete_teacher( {} ) called.", id);

        if !self.store.delete_teacher(id).await? {
            return Err(HwError::not_found(format!("There is no teacher with id {}.", id)));
        }
        log::info!("Deleted teacher {}.", id);

        let pairing = Pairing::new(self.store);
        let registry = Registry::new(self.store, self.notifier);
        let (unpaired, deleted) = tokio::join!(
            pairing.unpair(id),
            registry.delete_by_teacher(id),
        );

        match unpaired {
            Ok(n) => { log::debug!("Teacher {}'s {} students unpaired.", id, n); },
            Err(e) => { log::error!("Error unpairing students of deleted teacher {}: {}", id, &e); },
        }
        match deleted {
            Ok(n) => { log::debug!("Teacher {}'s {} homeworks deleted.", id, n); },
            Err(e) => { log::error!("Error deleting homework of deleted teacher {}: {}", id, &e); },
        }

        Ok(())
    }

    pub async fn delete_student(&self, id: i64) -> Result<(), HwError> {
        log::trace!("Accounts::delete_student( {} ) called.", id);

        if !self.store.delete_student(id).await? {
            return Err(HwError::not_found(format!("There is no student with id {}.", id)));
        }
        log::info!("Deleted student {}.", id);

        let registry = Registry::new(self.store, self.notifier);
        match registry.delete_by_student(id).await {
            Ok(n) => { log::debug!("Student {}'s {} homeworks deleted.", id, n); },
            Err(e) => { log::error!("Error deleting homework of deleted student {}: {}", id, &e); },
        }

        Ok(())
    }

    /// Delete the account `actor` is acting as.
    pub async fn delete(&self, actor: &Actor) -> Result<(), HwError> {
        match actor.role {
            Role::Teacher => self.delete_teacher(actor.id).await,
            Role::Student => self.delete_student(actor.id).await,
        }
    }
}
