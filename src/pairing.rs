/*!
Which student belongs to which teacher.

Each student has at most one teacher; a teacher has any number of students.
Changes are written immediately.
*/
use crate::{
    error::HwError,
    store::Store,
    user::{Student, Teacher},
};

pub struct Pairing<'a> {
    store: &'a dyn Store,
}

impl<'a> Pairing<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Make `teacher_id` the teacher of `student_id`, replacing any previous
    /// pairing. Both accounts must exist.
    pub async fn assign(&self, student_id: i64, teacher_id: i64) -> Result<(), HwError> {
        log::trace!("Pairing::assign( {}, {} ) called.", student_id, teacher_id);

        if self.store.get_teacher(teacher_id).await?.is_none() {
            return Err(HwError::not_found(format!("There is no teacher with id {}.", teacher_id)));
        }

        if !self.store.set_student_teacher(student_id, Some(teacher_id)).await? {
            return Err(HwError::not_found(format!("There is no student with id {}.", student_id)));
        }

        log::info!("Student {} paired with teacher {}.", student_id, teacher_id);
        Ok(())
    }

    /// All students currently paired with `teacher_id`, in no particular order.
    pub async fn students_of(&self, teacher_id: i64) -> Result<Vec<Student>, HwError> {
        log::trace!("Pairing::students_of( {} ) called.", teacher_id);
        Ok(self.store.get_students_by_teacher(teacher_id).await?)
    }

    /**
    The teacher `student_id` is paired with, or `None` if unpaired.

    A reference to a teacher that no longer exists counts as unpaired; it
    should have been cleared when the teacher went away, so it gets logged.
    */
    pub async fn teacher_of(&self, student_id: i64) -> Result<Option<Teacher>, HwError> {
        log::trace!("Pairing::teacher_of( {} ) called.", student_id);

        let student = match self.store.get_student(student_id).await? {
            Some(s) => s,
            None => {
                return Err(HwError::not_found(format!("There is no student with id {}.", student_id)));
            },
        };

        let teacher_id = match student.teacher_id {
            Some(id) => id,
            None => { return Ok(None); },
        };

        match self.store.get_teacher(teacher_id).await? {
            Some(t) => Ok(Some(t)),
            None => {
                log::warn!(
                    "Student {} refers to nonexistent teacher {}; treating as unpaired.",
                    student_id, teacher_id
                );
                Ok(None)
            },
        }
    }

    /// Unpair every student of `teacher_id`. Returns how many there were.
    pub async fn unpair(&self, teacher_id: i64) -> Result<u64, HwError> {
        log::trace!("Pairing::unpair( {} ) called.", teacher_id);

        let n = self.store.clear_teacher(teacher_id).await?;
        log::info!("Unpaired {} students from teacher {}.", n, teacher_id);
        Ok(n)
    }
}
