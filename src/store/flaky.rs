/*!
A `MemStore` that can be told to misbehave, for exercising the paths a
real database only takes under concurrency or failure.
*/
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use super::{mem::MemStore, DbError, Store};
use crate::{
    homework::{Homework, NewHomework},
    user::{NewAccount, Student, Teacher},
};

#[derive(Debug, Default)]
pub struct Flaky {
    pub inner: MemStore,
    /// Email lookups find nothing, as if another registration hadn't
    /// committed yet when we looked.
    pub blind_lookups: AtomicBool,
    /// Bulk homework deletes fail.
    pub fail_bulk_deletes: AtomicBool,
    /// The next `update_homework()` is beaten to the row by an identical
    /// write from somebody else.
    pub lose_next_update: AtomicBool,
}

impl Flaky {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl Store for Flaky {
    async fn ensure_db_schema(&self) -> Result<(), DbError> {
        self.inner.ensure_db_schema().await
    }

    async fn insert_teacher(&self, acct: &NewAccount) -> Result<Teacher, DbError> {
        self.inner.insert_teacher(acct).await
    }

    async fn insert_student(&self, acct: &NewAccount) -> Result<Student, DbError> {
        self.inner.insert_student(acct).await
    }

    async fn get_teacher(&self, id: i64) -> Result<Option<Teacher>, DbError> {
        self.inner.get_teacher(id).await
    }

    async fn get_teacher_by_email(&self, email: &str) -> Result<Option<Teacher>, DbError> {
        if self.blind_lookups.load(Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.get_teacher_by_email(email).await
    }

    async fn get_teachers(&self) -> Result<Vec<Teacher>, DbError> {
        self.inner.get_teachers().await
    }

    async fn get_student(&self, id: i64) -> Result<Option<Student>, DbError> {
        self.inner.get_student(id).await
    }

    async fn get_student_by_email(&self, email: &str) -> Result<Option<Student>, DbError> {
        if self.blind_lookups.load(Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.get_student_by_email(email).await
    }

    async fn delete_teacher(&self, id: i64) -> Result<bool, DbError> {
        self.inner.delete_teacher(id).await
    }

    async fn delete_student(&self, id: i64) -> Result<bool, DbError> {
        self.inner.delete_student(id).await
    }

    async fn set_student_teacher(
        &self,
        student_id: i64,
        teacher_id: Option<i64>,
    ) -> Result<bool, DbError> {
        self.inner.set_student_teacher(student_id, teacher_id).await
    }

    async fn get_students_by_teacher(&self, teacher_id: i64) -> Result<Vec<Student>, DbError> {
        self.inner.get_students_by_teacher(teacher_id).await
    }

    async fn clear_teacher(&self, teacher_id: i64) -> Result<u64, DbError> {
        self.inner.clear_teacher(teacher_id).await
    }

    async fn insert_homework(&self, hw: &NewHomework) -> Result<Homework, DbError> {
        self.inner.insert_homework(hw).await
    }

    async fn get_homework(&self, id: i64) -> Result<Option<Homework>, DbError> {
        self.inner.get_homework(id).await
    }

    async fn get_homeworks_by_teacher(&self, teacher_id: i64) -> Result<Vec<Homework>, DbError> {
        self.inner.get_homeworks_by_teacher(teacher_id).await
    }

    async fn get_homeworks_by_student(&self, student_id: i64) -> Result<Vec<Homework>, DbError> {
        self.inner.get_homeworks_by_student(student_id).await
    }

    async fn update_homework(&self, hw: &Homework) -> Result<Option<Homework>, DbError> {
        if self.lose_next_update.swap(false, Ordering::SeqCst) {
            log::debug!("Flaky: somebody else updates homework {} first.", hw.id);
            self.inner.update_homework(hw).await?;
        }
        self.inner.update_homework(hw).await
    }

    async fn delete_homework(&self, id: i64) -> Result<bool, DbError> {
        self.inner.delete_homework(id).await
    }

    async fn delete_homeworks_by_teacher(&self, teacher_id: i64) -> Result<u64, DbError> {
        if self.fail_bulk_deletes.load(Ordering::SeqCst) {
            return Err(DbError::from(format!("connection lost deleting teacher {}'s homework", teacher_id)));
        }
        self.inner.delete_homeworks_by_teacher(teacher_id).await
    }

    async fn delete_homeworks_by_student(&self, student_id: i64) -> Result<u64, DbError> {
        if self.fail_bulk_deletes.load(Ordering::SeqCst) {
            return Err(DbError::from(format!("connection lost deleting student {}'s homework", student_id)));
        }
        self.inner.delete_homeworks_by_student(student_id).await
    }
}
