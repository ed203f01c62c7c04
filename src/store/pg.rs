/*!
Postgres-backed `Store`.

The database this connects to is meant to have the following tables.
`ensure_db_schema()` will create any that are missing.

```sql
CREATE TABLE teachers (
    id            BIGSERIAL PRIMARY KEY,
    email         TEXT UNIQUE NOT NULL,
    name          TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    salt          TEXT NOT NULL,
    created_at    TIMESTAMPTZ NOT NULL
);

CREATE TABLE students (
    id            BIGSERIAL PRIMARY KEY,
    email         TEXT UNIQUE NOT NULL,
    name          TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    salt          TEXT NOT NULL,
    teacher_id    BIGINT,       /* teachers(id), unlinked by hand */
    created_at    TIMESTAMPTZ NOT NULL
);

CREATE TABLE homeworks (
    id             BIGSERIAL PRIMARY KEY,
    name           TEXT NOT NULL,
    description    TEXT NOT NULL,
    current_points SMALLINT NOT NULL,
    max_points     SMALLINT NOT NULL,
    kind           TEXT NOT NULL,   /* one of { 'listening', 'reading' } */
    status         TEXT NOT NULL,   /* one of { 'new', 'processing', 'finished', 'checked' } */
    teacher_id     BIGINT NOT NULL,
    student_id     BIGINT NOT NULL,
    revision       BIGINT NOT NULL DEFAULT 0,
    created_at     TIMESTAMPTZ NOT NULL,
    updated_at     TIMESTAMPTZ NOT NULL
);
```

There are deliberately no foreign key constraints between these; cleaning up
after a deleted account is done (best-effort) by `accounts`.
*/
use async_trait::async_trait;
use time::OffsetDateTime;
use tokio_postgres::{error::SqlState, Client, NoTls, Row};

use super::{DbError, Store};
use crate::{
    homework::{Homework, NewHomework, Status},
    user::{NewAccount, Student, Teacher},
};

static SCHEMA: &[(&str, &str, &str)] = &[
    (
        "SELECT FROM information_schema.tables WHERE table_name = 'teachers'",
        "CREATE TABLE teachers (
            id              BIGSERIAL PRIMARY KEY,
            email           TEXT UNIQUE NOT NULL,
            name            TEXT NOT NULL,
            password_hash   TEXT NOT NULL,
            salt            TEXT NOT NULL,
            created_at      TIMESTAMPTZ NOT NULL
        )",
        "DROP TABLE teachers",
    ),

    (
        "SELECT FROM information_schema.tables WHERE table_name = 'students'",
        "CREATE TABLE students (
            id              BIGSERIAL PRIMARY KEY,
            email           TEXT UNIQUE NOT NULL,
            name            TEXT NOT NULL,
            password_hash   TEXT NOT NULL,
            salt            TEXT NOT NULL,
            teacher_id      BIGINT,
            created_at      TIMESTAMPTZ NOT NULL
        )",
        "DROP TABLE students",
    ),

    (
        "SELECT FROM information_schema.tables WHERE table_name = 'homeworks'",
        "CREATE TABLE homeworks (
            id              BIGSERIAL PRIMARY KEY,
            name            TEXT NOT NULL,
            description     TEXT NOT NULL,
            current_points  SMALLINT NOT NULL,
            max_points      SMALLINT NOT NULL,
            kind            TEXT NOT NULL,
            status          TEXT NOT NULL,
            teacher_id      BIGINT NOT NULL,
            student_id      BIGINT NOT NULL,
            revision        BIGINT NOT NULL DEFAULT 0,
            created_at      TIMESTAMPTZ NOT NULL,
            updated_at      TIMESTAMPTZ NOT NULL
        )",
        "DROP TABLE homeworks",
    ),
];

const PHASE_ORDER: &str = "ORDER BY CASE status
    WHEN 'new' THEN 1
    WHEN 'processing' THEN 2
    WHEN 'finished' THEN 3
    WHEN 'checked' THEN 4
END";

impl From<tokio_postgres::error::Error> for DbError {
    fn from(e: tokio_postgres::error::Error) -> DbError {
        let mut s = format!("Data DB: {}", &e);
        if let Some(dbe) = e.as_db_error() {
            s.push_str(&format!("; {}", dbe));
        }
        if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
            DbError::duplicate(s)
        } else {
            DbError::from(s)
        }
    }
}

fn teacher_from_row(row: &Row) -> Result<Teacher, DbError> {
    Ok(Teacher {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        password_hash: row.try_get("password_hash")?,
        salt: row.try_get("salt")?,
        created_at: row.try_get("created_at")?,
    })
}

fn student_from_row(row: &Row) -> Result<Student, DbError> {
    Ok(Student {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        password_hash: row.try_get("password_hash")?,
        salt: row.try_get("salt")?,
        teacher_id: row.try_get("teacher_id")?,
        created_at: row.try_get("created_at")?,
    })
}

fn homework_from_row(row: &Row) -> Result<Homework, DbError> {
    let bad_value = |e: crate::HwError| DbError::from(format!("{}", &e))
        .annotate("Bad value in homeworks row");

    let current: i16 = row.try_get("current_points")?;
    let max: i16 = row.try_get("max_points")?;
    let kind: &str = row.try_get("kind")?;
    let status: &str = row.try_get("status")?;

    Ok(Homework {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        current_points: current.try_into().map_err(bad_value)?,
        max_points: max.try_into().map_err(bad_value)?,
        kind: kind.parse().map_err(bad_value)?,
        status: status.parse().map_err(bad_value)?,
        teacher_id: row.try_get("teacher_id")?,
        student_id: row.try_get("student_id")?,
        revision: row.try_get("revision")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn homeworks_from_rows(rows: &[Row]) -> Result<Vec<Homework>, DbError> {
    let mut hws: Vec<Homework> = Vec::with_capacity(rows.len());
    for row in rows.iter() {
        match homework_from_row(row) {
            Ok(h) => { hws.push(h); },
            Err(e) => {
                return Err(e.annotate("Unable to read Homework from database"));
            },
        }
    }
    Ok(hws)
}

pub struct PgStore {
    connection_string: String,
}

impl PgStore {
    pub fn new(connection_string: String) -> Self {
        log::trace!("PgStore::new( {:?} ) called.", &connection_string);
        Self { connection_string }
    }

    async fn connect(&self) -> Result<Client, DbError> {
        log::trace!(
            "PgStore::connect() called w/connection string {:?}",
            &self.connection_string
        );

        match tokio_postgres::connect(&self.connection_string, NoTls).await {
            Ok((client, connection)) => {
                log::trace!("    ...connection successful.");
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        log::error!("Data DB connection error: {}", &e);
                    } else {
                        log::trace!("tokio connection runtime drops.");
                    }
                });
                Ok(client)
            },
            Err(e) => {
                let dberr = DbError::from(e);
                log::trace!("    ...connection failed: {:?}", &dberr);
                Err(dberr.annotate("Unable to connect"))
            }
        }
    }

    /**
    Drop all database tables to fully reset database state.

    This is only meant for cleanup after testing. It is advisable to look at
    the ERROR level log output when testing to ensure this method did its job.
    */
    #[cfg(test)]
    pub async fn nuke_database(&self) -> Result<(), DbError> {
        log::trace!("PgStore::nuke_database() called.");

        let client = self.connect().await?;

        for (_, _, drop_stmt) in SCHEMA.iter().rev() {
            if let Err(e) = client.execute(drop_stmt.to_owned(), &[]).await {
                let err = DbError::from(e);
                log::error!("Error dropping: {:?}: {}", &drop_stmt, &err.display());
            }
        }

        log::trace!("    ....nuking complete.");
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ensure_db_schema(&self) -> Result<(), DbError> {
        log::trace!("PgStore::ensure_db_schema() called.");

        let mut client = self.connect().await?;
        let t = client.transaction().await
            .map_err(|e| DbError::from(e)
                .annotate("Data DB unable to begin transaction"))?;

        for (test_stmt, create_stmt, _) in SCHEMA.iter() {
            if t.query_opt(test_stmt.to_owned(), &[]).await?.is_none() {
                log::info!(
                    "{:?} returned no results; attempting to insert table.",
                    test_stmt
                );
                t.execute(create_stmt.to_owned(), &[]).await?;
            }
        }

        t.commit().await
            .map_err(|e| DbError::from(e)
                .annotate("Error committing transaction"))
    }

    async fn insert_teacher(&self, acct: &NewAccount) -> Result<Teacher, DbError> {
        log::trace!("PgStore::insert_teacher( {:?} ) called.", &acct.email);

        let client = self.connect().await?;
        let row = client.query_one(
            "INSERT INTO teachers (email, name, password_hash, salt, created_at)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *",
            &[
                &acct.email, &acct.name, &acct.password_hash, &acct.salt,
                &OffsetDateTime::now_utc(),
            ]
        ).await.map_err(|e| DbError::from(e).annotate("Error inserting teacher"))?;

        teacher_from_row(&row)
    }

    async fn insert_student(&self, acct: &NewAccount) -> Result<Student, DbError> {
        log::trace!("PgStore::insert_student( {:?} ) called.", &acct.email);

        let client = self.connect().await?;
        let row = client.query_one(
            "INSERT INTO students (email, name, password_hash, salt, created_at)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *",
            &[
                &acct.email, &acct.name, &acct.password_hash, &acct.salt,
                &OffsetDateTime::now_utc(),
            ]
        ).await.map_err(|e| DbError::from(e).annotate("Error inserting student"))?;

        student_from_row(&row)
    }

    async fn get_teacher(&self, id: i64) -> Result<Option<Teacher>, DbError> {
        log::trace!("PgStore::get_teacher( {} ) called.", id);

        let client = self.connect().await?;
        match client.query_opt("SELECT * FROM teachers WHERE id = $1", &[&id]).await? {
            Some(row) => Ok(Some(teacher_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_teacher_by_email(&self, email: &str) -> Result<Option<Teacher>, DbError> {
        log::trace!("PgStore::get_teacher_by_email( {:?} ) called.", email);

        let client = self.connect().await?;
        match client.query_opt("SELECT * FROM teachers WHERE email = $1", &[&email]).await? {
            Some(row) => Ok(Some(teacher_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_teachers(&self) -> Result<Vec<Teacher>, DbError> {
        log::trace!("PgStore::get_teachers() called.");

        let client = self.connect().await?;
        let rows = client.query("SELECT * FROM teachers ORDER BY name", &[]).await?;
        let mut teachers: Vec<Teacher> = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            teachers.push(teacher_from_row(row)?);
        }
        Ok(teachers)
    }

    async fn get_student(&self, id: i64) -> Result<Option<Student>, DbError> {
        log::trace!("PgStore::get_student( {} ) called.", id);

        let client = self.connect().await?;
        match client.query_opt("SELECT * FROM students WHERE id = $1", &[&id]).await? {
            Some(row) => Ok(Some(student_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_student_by_email(&self, email: &str) -> Result<Option<Student>, DbError> {
        log::trace!("PgStore::get_student_by_email( {:?} ) called.", email);

        let client = self.connect().await?;
        match client.query_opt("SELECT * FROM students WHERE email = $1", &[&email]).await? {
            Some(row) => Ok(Some(student_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn delete_teacher(&self, id: i64) -> Result<bool, DbError> {
        log::trace!("PgStore::delete_teacher( {} ) called.", id);

        let client = self.connect().await?;
        let n = client.execute("DELETE FROM teachers WHERE id = $1", &[&id]).await?;
        Ok(n > 0)
    }

    async fn delete_student(&self, id: i64) -> Result<bool, DbError> {
        log::trace!("PgStore::delete_student( {} ) called.", id);

        let client = self.connect().await?;
        let n = client.execute("DELETE FROM students WHERE id = $1", &[&id]).await?;
        Ok(n > 0)
    }

    async fn set_student_teacher(
        &self,
        student_id: i64,
        teacher_id: Option<i64>,
    ) -> Result<bool, DbError> {
        log::trace!(
            "PgStore::set_student_teacher( {}, {:?} ) called.",
            student_id, &teacher_id
        );

        let client = self.connect().await?;
        let n = client.execute(
            "UPDATE students SET teacher_id = $1 WHERE id = $2",
            &[&teacher_id, &student_id]
        ).await?;
        Ok(n > 0)
    }

    async fn get_students_by_teacher(&self, teacher_id: i64) -> Result<Vec<Student>, DbError> {
        log::trace!("PgStore::get_students_by_teacher( {} ) called.", teacher_id);

        let client = self.connect().await?;
        let rows = client.query(
            "SELECT * FROM students WHERE teacher_id = $1",
            &[&teacher_id]
        ).await?;

        let mut students: Vec<Student> = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            students.push(student_from_row(row)?);
        }
        Ok(students)
    }

    async fn clear_teacher(&self, teacher_id: i64) -> Result<u64, DbError> {
        log::trace!("PgStore::clear_teacher( {} ) called.", teacher_id);

        let client = self.connect().await?;
        let n = client.execute(
            "UPDATE students SET teacher_id = NULL WHERE teacher_id = $1",
            &[&teacher_id]
        ).await?;
        Ok(n)
    }

    async fn insert_homework(&self, hw: &NewHomework) -> Result<Homework, DbError> {
        log::trace!("PgStore::insert_homework( {:?} ) called.", hw);

        let current: i16 = hw.current_points.into();
        let max: i16 = hw.max_points.into();
        let now = OffsetDateTime::now_utc();

        let client = self.connect().await?;
        let row = client.query_one(
            "INSERT INTO homeworks (
                name, description, current_points, max_points, kind,
                status, teacher_id, student_id, created_at, updated_at
            )
            VALUES (
                $1, $2, $3, $4, $5,
                $6, $7, $8, $9, $9
            )
            RETURNING *",
            &[
                &hw.name, &hw.description, &current, &max, &hw.kind.as_str(),
                &Status::New.as_str(), &hw.teacher_id, &hw.student_id, &now,
            ]
        ).await.map_err(|e| DbError::from(e).annotate("Error inserting homework"))?;

        homework_from_row(&row)
    }

    async fn get_homework(&self, id: i64) -> Result<Option<Homework>, DbError> {
        log::trace!("PgStore::get_homework( {} ) called.", id);

        let client = self.connect().await?;
        match client.query_opt("SELECT * FROM homeworks WHERE id = $1", &[&id]).await? {
            Some(row) => Ok(Some(homework_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_homeworks_by_teacher(&self, teacher_id: i64) -> Result<Vec<Homework>, DbError> {
        log::trace!("PgStore::get_homeworks_by_teacher( {} ) called.", teacher_id);

        let client = self.connect().await?;
        let rows = client.query(
            format!("SELECT * FROM homeworks WHERE teacher_id = $1 {}", PHASE_ORDER).as_str(),
            &[&teacher_id]
        ).await?;

        homeworks_from_rows(&rows)
    }

    async fn get_homeworks_by_student(&self, student_id: i64) -> Result<Vec<Homework>, DbError> {
        log::trace!("PgStore::get_homeworks_by_student( {} ) called.", student_id);

        let client = self.connect().await?;
        let rows = client.query(
            format!("SELECT * FROM homeworks WHERE student_id = $1 {}", PHASE_ORDER).as_str(),
            &[&student_id]
        ).await?;

        homeworks_from_rows(&rows)
    }

    async fn update_homework(&self, hw: &Homework) -> Result<Option<Homework>, DbError> {
        log::trace!("PgStore::update_homework( {}, rev {} ) called.", hw.id, hw.revision);

        let current: i16 = hw.current_points.into();

        let client = self.connect().await?;
        let row = client.query_opt(
            "UPDATE homeworks SET
                current_points = $1, status = $2,
                revision = revision + 1, updated_at = $3
            WHERE id = $4 AND revision = $5
            RETURNING *",
            &[
                &current, &hw.status.as_str(), &OffsetDateTime::now_utc(),
                &hw.id, &hw.revision,
            ]
        ).await?;

        match row {
            Some(row) => Ok(Some(homework_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn delete_homework(&self, id: i64) -> Result<bool, DbError> {
        log::trace!("PgStore::delete_homework( {} ) called.", id);

        let client = self.connect().await?;
        let n = client.execute("DELETE FROM homeworks WHERE id = $1", &[&id]).await?;
        Ok(n > 0)
    }

    async fn delete_homeworks_by_teacher(&self, teacher_id: i64) -> Result<u64, DbError> {
        log::trace!("PgStore::delete_homeworks_by_teacher( {} ) called.", teacher_id);

        let client = self.connect().await?;
        let n = client.execute(
            "DELETE FROM homeworks WHERE teacher_id = $1",
            &[&teacher_id]
        ).await?;
        Ok(n)
    }

    async fn delete_homeworks_by_student(&self, student_id: i64) -> Result<u64, DbError> {
        log::trace!("PgStore::delete_homeworks_by_student( {} ) called.", student_id);

        let client = self.connect().await?;
        let n = client.execute(
            "DELETE FROM homeworks WHERE student_id = $1",
            &[&student_id]
        ).await?;
        Ok(n)
    }
}
