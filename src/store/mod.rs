/*!
Persistence.

The rest of the crate only ever talks to the `Store` trait. There are two
implementations: `pg::PgStore`, backed by Postgres, and `mem::MemStore`,
which keeps everything in process memory.

Nothing in here enforces lifecycle or ownership rules; that's the job of
`registry`, `pairing`, and `policy`. The one guarantee a `Store` does make
is that `update_homework()` is conditional on the revision the caller read.
*/
use async_trait::async_trait;

use crate::{
    homework::{Homework, NewHomework},
    user::{NewAccount, Student, Teacher},
};

pub mod mem;
pub mod pg;
#[cfg(test)]
pub(crate) mod flaky;

#[derive(Debug, PartialEq)]
pub struct DbError {
    msg: String,
    /// A unique constraint (account email) would have been violated.
    duplicate: bool,
}

impl DbError {
    pub fn duplicate(msg: String) -> Self {
        Self { msg, duplicate: true }
    }

    pub fn is_duplicate(&self) -> bool { self.duplicate }

    /// Prepend some contextual `annotation` for the error.
    pub fn annotate(self, annotation: &str) -> Self {
        let msg = format!("{}: {}", annotation, &self.msg);
        Self { msg, ..self }
    }

    pub fn display(&self) -> &str { &self.msg }
}

impl std::fmt::Display for DbError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", &self.msg)
    }
}

impl From<String> for DbError {
    fn from(msg: String) -> DbError { DbError { msg, duplicate: false } }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Make sure whatever backs the store is ready to be used.
    async fn ensure_db_schema(&self) -> Result<(), DbError>;

    /// Fails with `DbError::is_duplicate()` if the email is already taken.
    async fn insert_teacher(&self, acct: &NewAccount) -> Result<Teacher, DbError>;
    async fn insert_student(&self, acct: &NewAccount) -> Result<Student, DbError>;
    async fn get_teacher(&self, id: i64) -> Result<Option<Teacher>, DbError>;
    async fn get_teacher_by_email(&self, email: &str) -> Result<Option<Teacher>, DbError>;
    async fn get_teachers(&self) -> Result<Vec<Teacher>, DbError>;
    async fn get_student(&self, id: i64) -> Result<Option<Student>, DbError>;
    async fn get_student_by_email(&self, email: &str) -> Result<Option<Student>, DbError>;
    /// Returns `false` if there was no such teacher.
    async fn delete_teacher(&self, id: i64) -> Result<bool, DbError>;
    /// Returns `false` if there was no such student.
    async fn delete_student(&self, id: i64) -> Result<bool, DbError>;

    /// Point a student at a teacher (or at nobody). Returns `false` if there
    /// was no such student.
    async fn set_student_teacher(
        &self,
        student_id: i64,
        teacher_id: Option<i64>,
    ) -> Result<bool, DbError>;
    async fn get_students_by_teacher(&self, teacher_id: i64) -> Result<Vec<Student>, DbError>;
    /// Unpair every student of the given teacher; returns how many.
    async fn clear_teacher(&self, teacher_id: i64) -> Result<u64, DbError>;

    async fn insert_homework(&self, hw: &NewHomework) -> Result<Homework, DbError>;
    async fn get_homework(&self, id: i64) -> Result<Option<Homework>, DbError>;
    async fn get_homeworks_by_teacher(&self, teacher_id: i64) -> Result<Vec<Homework>, DbError>;
    async fn get_homeworks_by_student(&self, student_id: i64) -> Result<Vec<Homework>, DbError>;
    /**
    Write the mutable fields of `hw` (points, status) back, but only if the
    stored revision still equals `hw.revision`. On success the stored
    revision is incremented and the fresh row returned; `None` means the row
    was changed or removed in the meantime and nothing was written.
    */
    async fn update_homework(&self, hw: &Homework) -> Result<Option<Homework>, DbError>;
    async fn delete_homework(&self, id: i64) -> Result<bool, DbError>;
    async fn delete_homeworks_by_teacher(&self, teacher_id: i64) -> Result<u64, DbError>;
    async fn delete_homeworks_by_student(&self, student_id: i64) -> Result<u64, DbError>;
}
