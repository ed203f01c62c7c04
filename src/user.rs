/*!
Teacher and Student accounts.
*/
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let token = match self {
            Role::Teacher => "teacher",
            Role::Student => "student",
        };

        write!(f, "{}", token)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "teacher" => Ok(Role::Teacher),
            "student" => Ok(Role::Student),
            _ => Err(format!("{:?} is not a valid Role.", s)),
        }
    }
}

/// The authenticated party on whose behalf the core is invoked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Actor {
    pub role: Role,
    pub id: i64,
}

impl Actor {
    pub fn teacher(id: i64) -> Actor { Actor { role: Role::Teacher, id } }
    pub fn student(id: i64) -> Actor { Actor { role: Role::Student, id } }
}

/// Where a notice gets sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contact {
    pub email: String,
    pub name: String,
}

/// Everything needed to insert either kind of account.
#[derive(Clone, Debug)]
pub struct NewAccount {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub salt: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Teacher {
    pub id: i64,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub salt: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Teacher {
    pub fn contact(&self) -> Contact {
        Contact { email: self.email.clone(), name: self.name.clone() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Student {
    pub id: i64,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub salt: String,
    /// `id` of the paired teacher, if any.
    pub teacher_id: Option<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Student {
    pub fn contact(&self) -> Contact {
        Contact { email: self.email.clone(), name: self.name.clone() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Account {
    Teacher(Teacher),
    Student(Student),
}

impl Account {
    pub fn id(&self) -> i64 {
        match self {
            Account::Teacher(t) => t.id,
            Account::Student(s) => s.id,
        }
    }

    pub fn email(&self) -> &str {
        match self {
            Account::Teacher(t) => &t.email,
            Account::Student(s) => &s.email,
        }
    }

    pub fn password_hash(&self) -> &str {
        match self {
            Account::Teacher(t) => &t.password_hash,
            Account::Student(s) => &s.password_hash,
        }
    }

    pub fn salt(&self) -> &str {
        match self {
            Account::Teacher(t) => &t.salt,
            Account::Student(s) => &s.salt,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Account::Teacher(_) => Role::Teacher,
            Account::Student(_) => Role::Student,
        }
    }

    pub fn actor(&self) -> Actor {
        Actor { role: self.role(), id: self.id() }
    }
}
