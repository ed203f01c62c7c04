/*!
A `Store` that lives entirely in process memory.

Used by the test suite and by `storage = "memory"` for trying things out.
All state is lost when the process exits.
*/
use std::collections::BTreeMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::{DbError, Store};
use crate::{
    homework::{sort_by_phase, Homework, NewHomework},
    user::{NewAccount, Student, Teacher},
};

#[derive(Debug, Default)]
struct Tables {
    last_id: i64,
    teachers: BTreeMap<i64, Teacher>,
    students: BTreeMap<i64, Student>,
    homeworks: BTreeMap<i64, Homework>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

#[derive(Debug, Default)]
pub struct MemStore {
    tables: RwLock<Tables>,
}

impl MemStore {
    pub fn new() -> Self {
        log::trace!("MemStore::new() called.");
        Self::default()
    }
}

#[async_trait]
impl Store for MemStore {
    async fn ensure_db_schema(&self) -> Result<(), DbError> {
        Ok(())
    }

    async fn insert_teacher(&self, acct: &NewAccount) -> Result<Teacher, DbError> {
        log::trace!("MemStore::insert_teacher( {:?} ) called.", &acct.email);

        let mut t = self.tables.write().await;
        if t.teachers.values().any(|x| x.email == acct.email) {
            return Err(DbError::duplicate(format!("Teacher email {:?} already exists.", &acct.email)));
        }
        let teacher = Teacher {
            id: t.next_id(),
            email: acct.email.clone(),
            name: acct.name.clone(),
            password_hash: acct.password_hash.clone(),
            salt: acct.salt.clone(),
            created_at: OffsetDateTime::now_utc(),
        };
        t.teachers.insert(teacher.id, teacher.clone());
        Ok(teacher)
    }

    async fn insert_student(&self, acct: &NewAccount) -> Result<Student, DbError> {
        log::trace!("MemStore::insert_student( {:?} ) called.", &acct.email);

        let mut t = self.tables.write().await;
        if t.students.values().any(|x| x.email == acct.email) {
            return Err(DbError::duplicate(format!("Student email {:?} already exists.", &acct.email)));
        }
        let student = Student {
            id: t.next_id(),
            email: acct.email.clone(),
            name: acct.name.clone(),
            password_hash: acct.password_hash.clone(),
            salt: acct.salt.clone(),
            teacher_id: None,
            created_at: OffsetDateTime::now_utc(),
        };
        t.students.insert(student.id, student.clone());
        Ok(student)
    }

    async fn get_teacher(&self, id: i64) -> Result<Option<Teacher>, DbError> {
        Ok(self.tables.read().await.teachers.get(&id).cloned())
    }

    async fn get_teacher_by_email(&self, email: &str) -> Result<Option<Teacher>, DbError> {
        Ok(self.tables.read().await.teachers.values()
            .find(|t| t.email == email)
            .cloned())
    }

    async fn get_teachers(&self) -> Result<Vec<Teacher>, DbError> {
        Ok(self.tables.read().await.teachers.values().cloned().collect())
    }

    async fn get_student(&self, id: i64) -> Result<Option<Student>, DbError> {
        Ok(self.tables.read().await.students.get(&id).cloned())
    }

    async fn get_student_by_email(&self, email: &str) -> Result<Option<Student>, DbError> {
        Ok(self.tables.read().await.students.values()
            .find(|s| s.email == email)
            .cloned())
    }

    async fn delete_teacher(&self, id: i64) -> Result<bool, DbError> {
        log::trace!("MemStore::delete_teacher( {} ) called.", id);
        Ok(self.tables.write().await.teachers.remove(&id).is_some())
    }

    async fn delete_student(&self, id: i64) -> Result<bool, DbError> {
        log::trace!("MemStore::delete_student( {} ) called.", id);
        Ok(self.tables.write().await.students.remove(&id).is_some())
    }

    async fn set_student_teacher(
        &self,
        student_id: i64,
        teacher_id: Option<i64>,
    ) -> Result<bool, DbError> {
        log::trace!(
            "MemStore::set_student_teacher( {}, {:?} ) called.",
            student_id, &teacher_id
        );

        match self.tables.write().await.students.get_mut(&student_id) {
            Some(s) => {
                s.teacher_id = teacher_id;
                Ok(true)
            },
            None => Ok(false),
        }
    }

    async fn get_students_by_teacher(&self, teacher_id: i64) -> Result<Vec<Student>, DbError> {
        Ok(self.tables.read().await.students.values()
            .filter(|s| s.teacher_id == Some(teacher_id))
            .cloned()
            .collect())
    }

    async fn clear_teacher(&self, teacher_id: i64) -> Result<u64, DbError> {
        log::trace!("MemStore::clear_teacher( {} ) called.", teacher_id);

        let mut t = self.tables.write().await;
        let mut n: u64 = 0;
        for s in t.students.values_mut().filter(|s| s.teacher_id == Some(teacher_id)) {
            s.teacher_id = None;
            n += 1;
        }
        Ok(n)
    }

    async fn insert_homework(&self, hw: &NewHomework) -> Result<Homework, DbError> {
        log::trace!("MemStore::insert_homework( {:?} ) called.", hw);

        let mut t = self.tables.write().await;
        let now = OffsetDateTime::now_utc();
        let new = Homework {
            id: t.next_id(),
            name: hw.name.clone(),
            description: hw.description.clone(),
            current_points: hw.current_points,
            max_points: hw.max_points,
            kind: hw.kind,
            status: crate::homework::Status::New,
            teacher_id: hw.teacher_id,
            student_id: hw.student_id,
            revision: 0,
            created_at: now,
            updated_at: now,
        };
        t.homeworks.insert(new.id, new.clone());
        Ok(new)
    }

    async fn get_homework(&self, id: i64) -> Result<Option<Homework>, DbError> {
        Ok(self.tables.read().await.homeworks.get(&id).cloned())
    }

    async fn get_homeworks_by_teacher(&self, teacher_id: i64) -> Result<Vec<Homework>, DbError> {
        let mut hws: Vec<Homework> = self.tables.read().await.homeworks.values()
            .filter(|h| h.teacher_id == teacher_id)
            .cloned()
            .collect();
        sort_by_phase(&mut hws);
        Ok(hws)
    }

    async fn get_homeworks_by_student(&self, student_id: i64) -> Result<Vec<Homework>, DbError> {
        let mut hws: Vec<Homework> = self.tables.read().await.homeworks.values()
            .filter(|h| h.student_id == student_id)
            .cloned()
            .collect();
        sort_by_phase(&mut hws);
        Ok(hws)
    }

    async fn update_homework(&self, hw: &Homework) -> Result<Option<Homework>, DbError> {
        log::trace!("MemStore::update_homework( {}, rev {} ) called.", hw.id, hw.revision);

        let mut t = self.tables.write().await;
        let stored = match t.homeworks.get_mut(&hw.id) {
            Some(stored) if stored.revision == hw.revision => stored,
            _ => { return Ok(None); },
        };

        stored.current_points = hw.current_points;
        stored.status = hw.status;
        stored.revision += 1;
        stored.updated_at = OffsetDateTime::now_utc();
        Ok(Some(stored.clone()))
    }

    async fn delete_homework(&self, id: i64) -> Result<bool, DbError> {
        log::trace!("MemStore::delete_homework( {} ) called.", id);
        Ok(self.tables.write().await.homeworks.remove(&id).is_some())
    }

    async fn delete_homeworks_by_teacher(&self, teacher_id: i64) -> Result<u64, DbError> {
        log::trace!("MemStore::delete_homeworks_by_teacher( {} ) called.", teacher_id);

        let mut t = self.tables.write().await;
        let before = t.homeworks.len();
        t.homeworks.retain(|_, h| h.teacher_id != teacher_id);
        Ok((before - t.homeworks.len()) as u64)
    }

    async fn delete_homeworks_by_student(&self, student_id: i64) -> Result<u64, DbError> {
        log::trace!("MemStore::delete_homeworks_by_student( {} ) called.", student_id);

        let mut t = self.tables.write().await;
        let before = t.homeworks.len();
        t.homeworks.retain(|_, h| h.student_id != student_id);
        Ok((before - t.homeworks.len()) as u64)
    }
}
