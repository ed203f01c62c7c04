/*!
Creating, finding, advancing, and removing homework.

Every mutating operation takes the acting `Actor`, runs it past `policy`
before touching anything, and tells the other party about it through the
`Notifier` once the change has been written. A notice that can't be sent
never undoes or fails the change.
*/
use serde::Serialize;

use crate::{
    error::HwError,
    homework::{check_points, sort_by_phase, Homework, Kind, NewHomework, Points, Status},
    notify::{Notice, NoticeKind, Notifier},
    policy::{self, Action},
    store::Store,
    user::{Actor, Contact, Role},
};

/// What a teacher fills in to assign homework.
#[derive(Clone, Debug, PartialEq)]
pub struct Draft {
    pub name: String,
    pub description: String,
    pub current_points: Points,
    pub max_points: Points,
    pub kind: Kind,
    /// Homework always starts out `new`; anything else here is refused.
    pub initial_status: Option<Status>,
    pub student_id: i64,
}

/// A requested status change, plus the score when it's a grading.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Change {
    pub status: Status,
    pub current_points: Option<Points>,
}

impl Change {
    pub fn to(status: Status) -> Change {
        Change { status, current_points: None }
    }

    pub fn grade(points: Points) -> Change {
        Change { status: Status::Checked, current_points: Some(points) }
    }
}

/// A homework along with who's involved and what the viewer can do next.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HomeworkView {
    #[serde(flatten)]
    pub homework: Homework,
    pub teacher: Option<String>,
    pub student: Option<String>,
    pub can_start: bool,
    pub can_finish: bool,
    pub can_check: bool,
}

pub struct Registry<'a> {
    store: &'a dyn Store,
    notifier: &'a dyn Notifier,
}

impl<'a> Registry<'a> {
    pub fn new(store: &'a dyn Store, notifier: &'a dyn Notifier) -> Self {
        Self { store, notifier }
    }

    async fn teacher_contact(&self, id: i64) -> Option<Contact> {
        match self.store.get_teacher(id).await {
            Ok(Some(t)) => Some(t.contact()),
            Ok(None) => {
                log::warn!("No teacher {} to notify.", id);
                None
            },
            Err(e) => {
                log::error!("Error looking up teacher {} to notify: {}", id, &e);
                None
            },
        }
    }

    async fn student_contact(&self, id: i64) -> Option<Contact> {
        match self.store.get_student(id).await {
            Ok(Some(s)) => Some(s.contact()),
            Ok(None) => {
                log::warn!("No student {} to notify.", id);
                None
            },
            Err(e) => {
                log::error!("Error looking up student {} to notify: {}", id, &e);
                None
            },
        }
    }

    pub async fn create(&self, actor: &Actor, draft: Draft) -> Result<Homework, HwError> {
        log::trace!("Registry::create( {:?}, {:?} ) called.", actor, &draft);

        policy::may_create(actor).into_result()?;

        if let Some(status) = draft.initial_status {
            if status != Status::New {
                return Err(HwError::invalid(format!(
                    "Homework starts out new, not {}.", status
                )));
            }
        }

        let new = NewHomework {
            name: draft.name,
            description: draft.description,
            current_points: draft.current_points,
            max_points: draft.max_points,
            kind: draft.kind,
            teacher_id: actor.id,
            student_id: draft.student_id,
        };
        new.validate()?;

        if self.store.get_teacher(actor.id).await?.is_none() {
            return Err(HwError::not_found(format!("There is no teacher with id {}.", actor.id)));
        }
        let student = match self.store.get_student(new.student_id).await? {
            Some(s) => s,
            None => {
                return Err(HwError::not_found(format!(
                    "There is no student with id {}.", new.student_id
                )));
            },
        };

        let hw = self.store.insert_homework(&new).await?;
        log::info!(
            "Teacher {} assigned homework {} ({:?}) to student {}.",
            hw.teacher_id, hw.id, &hw.name, hw.student_id
        );

        self.notifier.dispatch(Notice::new(NoticeKind::Created, &student.contact(), &hw));
        Ok(hw)
    }

    pub async fn get(&self, id: i64) -> Result<Homework, HwError> {
        log::trace!("Registry::get( {} ) called.", id);

        match self.store.get_homework(id).await? {
            Some(hw) => Ok(hw),
            None => Err(HwError::not_found(format!("There is no homework with id {}.", id))),
        }
    }

    /// The homework, if `actor` is its author or assignee.
    pub async fn get_for(&self, actor: &Actor, id: i64) -> Result<Homework, HwError> {
        let hw = self.get(id).await?;
        policy::authorize(actor, Action::View, &hw).into_result()?;
        Ok(hw)
    }

    pub async fn view(&self, actor: &Actor, id: i64) -> Result<HomeworkView, HwError> {
        log::trace!("Registry::view( {:?}, {} ) called.", actor, id);

        let homework = self.get_for(actor, id).await?;
        let (teacher, student) = tokio::join!(
            self.store.get_teacher(homework.teacher_id),
            self.store.get_student(homework.student_id),
        );

        let may = |to: Status| policy::authorize(actor, Action::Transition(to), &homework).is_allowed();
        let can_start = may(Status::Processing);
        let can_finish = may(Status::Finished);
        let can_check = may(Status::Checked);

        Ok(HomeworkView {
            teacher: teacher?.map(|t| t.name),
            student: student?.map(|s| s.name),
            can_start,
            can_finish,
            can_check,
            homework,
        })
    }

    pub async fn list_by_teacher(&self, teacher_id: i64) -> Result<Vec<Homework>, HwError> {
        log::trace!("Registry::list_by_teacher( {} ) called.", teacher_id);

        let mut hws = self.store.get_homeworks_by_teacher(teacher_id).await?;
        sort_by_phase(&mut hws);
        Ok(hws)
    }

    pub async fn list_by_student(&self, student_id: i64) -> Result<Vec<Homework>, HwError> {
        log::trace!("Registry::list_by_student( {} ) called.", student_id);

        let mut hws = self.store.get_homeworks_by_student(student_id).await?;
        sort_by_phase(&mut hws);
        Ok(hws)
    }

    /// Everything `actor` authored (teacher) or was assigned (student).
    pub async fn list_for(&self, actor: &Actor) -> Result<Vec<Homework>, HwError> {
        match actor.role {
            Role::Teacher => self.list_by_teacher(actor.id).await,
            Role::Student => self.list_by_student(actor.id).await,
        }
    }

    /**
    Move homework `id` one step along its lifecycle on behalf of `actor`.

    The write is conditional on the homework not having changed since it
    was read here; losing that race is a `Conflict`, and nothing is written.
    */
    pub async fn apply_transition(
        &self,
        actor: &Actor,
        id: i64,
        change: Change,
    ) -> Result<Homework, HwError> {
        log::trace!("Registry::apply_transition( {:?}, {}, {:?} ) called.", actor, id, &change);

        let mut hw = self.get(id).await?;
        policy::authorize(actor, Action::Transition(change.status), &hw).into_result()?;

        match (change.status, change.current_points) {
            (Status::Checked, Some(points)) => {
                check_points(points, hw.max_points)?;
                hw.current_points = points;
            },
            (Status::Checked, None) => {
                return Err(HwError::invalid("Checking homework requires current points."));
            },
            (_, Some(_)) => {
                return Err(HwError::invalid("Points are only set when checking homework."));
            },
            (_, None) => {},
        }

        let from = hw.status;
        hw.status = change.status;

        let hw = match self.store.update_homework(&hw).await? {
            Some(updated) => updated,
            None => {
                return match self.store.get_homework(id).await? {
                    None => Err(HwError::not_found(format!("Homework {} was deleted.", id))),
                    Some(_) => Err(HwError::Conflict(format!(
                        "Homework {} was changed by someone else; try again.", id
                    ))),
                };
            },
        };
        log::info!("Homework {} moved from {} to {} by {:?}.", hw.id, from, hw.status, actor);

        let (kind, contact) = match hw.status {
            Status::Processing => (NoticeKind::Started, self.teacher_contact(hw.teacher_id).await),
            Status::Finished => (NoticeKind::Finished, self.teacher_contact(hw.teacher_id).await),
            Status::Checked => (NoticeKind::Graded, self.student_contact(hw.student_id).await),
            Status::New => { return Ok(hw); },
        };
        if let Some(to) = contact {
            self.notifier.dispatch(Notice::new(kind, &to, &hw));
        }

        Ok(hw)
    }

    /// Remove a single homework. Only its author may.
    pub async fn delete(&self, actor: &Actor, id: i64) -> Result<(), HwError> {
        log::trace!("Registry::delete( {:?}, {} ) called.", actor, id);

        let hw = self.get(id).await?;
        policy::authorize(actor, Action::Delete, &hw).into_result()?;

        if self.store.delete_homework(id).await? {
            log::info!("Homework {} deleted by {:?}.", id, actor);
            Ok(())
        } else {
            Err(HwError::not_found(format!("There is no homework with id {}.", id)))
        }
    }

    pub async fn delete_by_teacher(&self, teacher_id: i64) -> Result<u64, HwError> {
        log::trace!("Registry::delete_by_teacher( {} ) called.", teacher_id);
        Ok(self.store.delete_homeworks_by_teacher(teacher_id).await?)
    }

    pub async fn delete_by_student(&self, student_id: i64) -> Result<u64, HwError> {
        log::trace!("Registry::delete_by_student( {} ) called.", student_id);
        Ok(self.store.delete_homeworks_by_student(student_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::Recorder;
    use crate::policy::DenyReason;
    use crate::store::mem::MemStore;
    use crate::tests::ensure_logging;
    use crate::user::{NewAccount, Student, Teacher};

    fn acct(email: &str, name: &str) -> NewAccount {
        NewAccount {
            email: email.to_owned(),
            name: name.to_owned(),
            password_hash: String::new(),
            salt: String::new(),
        }
    }

    fn pts(n: u8) -> Points {
        Points::new(n).unwrap()
    }

    fn draft(name: &str, student_id: i64) -> Draft {
        Draft {
            name: name.to_owned(),
            description: "Do the exercise.".to_owned(),
            current_points: pts(0),
            max_points: pts(20),
            kind: Kind::Listening,
            initial_status: Some(Status::New),
            student_id,
        }
    }

    struct Fixture {
        db: MemStore,
        rec: Recorder,
        t: Teacher,
        s: Student,
    }

    impl Fixture {
        async fn new() -> Fixture {
            ensure_logging();
            let db = MemStore::new();
            let t = db.insert_teacher(&acct("jenny@school.test", "Ms Jenny")).await.unwrap();
            let s = db.insert_student(&acct("sam@school.test", "Sam")).await.unwrap();
            Fixture { db, rec: Recorder::default(), t, s }
        }

        fn registry(&self) -> Registry<'_> {
            Registry::new(&self.db, &self.rec)
        }
    }

    #[tokio::test]
    async fn full_lifecycle() {
        let f = Fixture::new().await;
        let reg = f.registry();
        let teacher = Actor::teacher(f.t.id);
        let student = Actor::student(f.s.id);

        let hw = reg.create(&teacher, draft("Listening Ex. 3", f.s.id)).await.unwrap();
        assert_eq!(Status::New, hw.status);
        let notices = f.rec.take();
        assert_eq!(1, notices.len());
        assert_eq!((NoticeKind::Created, "sam@school.test"), (notices[0].kind, notices[0].email.as_str()));

        let listed = reg.list_by_student(f.s.id).await.unwrap();
        assert_eq!(1, listed.len());
        assert_eq!(Status::New, listed[0].status);

        let hw = reg.apply_transition(&student, hw.id, Change::to(Status::Processing)).await.unwrap();
        assert_eq!(Status::Processing, hw.status);
        let notices = f.rec.take();
        assert_eq!((NoticeKind::Started, "jenny@school.test"), (notices[0].kind, notices[0].email.as_str()));

        let hw = reg.apply_transition(&student, hw.id, Change::to(Status::Finished)).await.unwrap();
        assert_eq!(Status::Finished, hw.status);
        let notices = f.rec.take();
        assert_eq!((NoticeKind::Finished, "jenny@school.test"), (notices[0].kind, notices[0].email.as_str()));

        let hw = reg.apply_transition(&teacher, hw.id, Change::grade(pts(18))).await.unwrap();
        assert_eq!((Status::Checked, 18), (hw.status, hw.current_points.get()));
        let notices = f.rec.take();
        assert_eq!((NoticeKind::Graded, "sam@school.test"), (notices[0].kind, notices[0].email.as_str()));

        for (actor, to) in [
            (student, Status::Processing),
            (student, Status::Finished),
            (teacher, Status::Checked),
            (teacher, Status::New),
        ] {
            let change = Change { status: to, current_points: if to == Status::Checked { Some(pts(1)) } else { None } };
            assert_eq!(
                Err(HwError::PolicyDenied(DenyReason::Terminal)),
                reg.apply_transition(&actor, hw.id, change).await
            );
        }
        assert!(f.rec.take().is_empty());
        assert_eq!(Status::Checked, reg.get(hw.id).await.unwrap().status);
    }

    #[tokio::test]
    async fn create_rules() {
        let f = Fixture::new().await;
        let reg = f.registry();
        let teacher = Actor::teacher(f.t.id);

        assert_eq!(
            Err(HwError::PolicyDenied(DenyReason::NotTeacher)),
            reg.create(&Actor::student(f.s.id), draft("Nope", f.s.id)).await
        );

        let mut d = draft("Skipping ahead", f.s.id);
        d.initial_status = Some(Status::Checked);
        assert!(matches!(reg.create(&teacher, d).await, Err(HwError::Validation(_))));

        let mut d = draft("Too many points", f.s.id);
        d.current_points = pts(21);
        assert!(matches!(reg.create(&teacher, d).await, Err(HwError::Validation(_))));

        assert!(matches!(
            reg.create(&teacher, draft("Nobody", 999)).await,
            Err(HwError::NotFound(_))
        ));
        assert!(matches!(
            reg.create(&Actor::teacher(998), draft("Ghost teacher", f.s.id)).await,
            Err(HwError::NotFound(_))
        ));

        let mut d = draft("Status left out", f.s.id);
        d.initial_status = None;
        assert_eq!(Status::New, reg.create(&teacher, d).await.unwrap().status);

        // Unpaired students can still be assigned homework.
        assert_eq!(None, f.db.get_student(f.s.id).await.unwrap().unwrap().teacher_id);
    }

    #[tokio::test]
    async fn strangers_are_denied() {
        let f = Fixture::new().await;
        let other_t = f.db.insert_teacher(&acct("berro@school.test", "Mr Berro")).await.unwrap();
        let other_s = f.db.insert_student(&acct("kim@school.test", "Kim")).await.unwrap();
        let reg = f.registry();

        let hw = reg.create(&Actor::teacher(f.t.id), draft("Reading 1", f.s.id)).await.unwrap();
        f.rec.take();

        assert_eq!(
            Err(HwError::PolicyDenied(DenyReason::NotAssignee)),
            reg.apply_transition(&Actor::student(other_s.id), hw.id, Change::to(Status::Processing)).await
        );
        assert_eq!(
            Err(HwError::PolicyDenied(DenyReason::NotAssignee)),
            reg.get_for(&Actor::student(other_s.id), hw.id).await
        );

        reg.apply_transition(&Actor::student(f.s.id), hw.id, Change::to(Status::Processing)).await.unwrap();
        reg.apply_transition(&Actor::student(f.s.id), hw.id, Change::to(Status::Finished)).await.unwrap();
        assert_eq!(
            Err(HwError::PolicyDenied(DenyReason::NotAuthor)),
            reg.apply_transition(&Actor::teacher(other_t.id), hw.id, Change::grade(pts(5))).await
        );
        assert_eq!(
            Err(HwError::PolicyDenied(DenyReason::WrongRole { from: Status::Finished, to: Status::Checked })),
            reg.apply_transition(&Actor::student(f.s.id), hw.id, Change::grade(pts(20))).await
        );
        assert_eq!(Status::Finished, reg.get(hw.id).await.unwrap().status);
    }

    #[tokio::test]
    async fn grading_needs_sane_points() {
        let f = Fixture::new().await;
        let reg = f.registry();
        let teacher = Actor::teacher(f.t.id);
        let student = Actor::student(f.s.id);

        let hw = reg.create(&teacher, draft("Reading 2", f.s.id)).await.unwrap();
        assert!(matches!(
            reg.apply_transition(&student, hw.id, Change { status: Status::Processing, current_points: Some(pts(3)) }).await,
            Err(HwError::Validation(_))
        ));
        reg.apply_transition(&student, hw.id, Change::to(Status::Processing)).await.unwrap();
        reg.apply_transition(&student, hw.id, Change::to(Status::Finished)).await.unwrap();

        assert!(matches!(
            reg.apply_transition(&teacher, hw.id, Change::to(Status::Checked)).await,
            Err(HwError::Validation(_))
        ));
        assert!(matches!(
            reg.apply_transition(&teacher, hw.id, Change::grade(pts(21))).await,
            Err(HwError::Validation(_))
        ));
        assert_eq!(Status::Finished, reg.get(hw.id).await.unwrap().status);

        let hw = reg.apply_transition(&teacher, hw.id, Change::grade(pts(20))).await.unwrap();
        assert_eq!(20, hw.current_points.get());
    }

    #[tokio::test]
    async fn listings_are_in_phase_order() {
        let f = Fixture::new().await;
        let reg = f.registry();
        let teacher = Actor::teacher(f.t.id);
        let student = Actor::student(f.s.id);

        let mut ids = Vec::new();
        for n in 0..6 {
            ids.push(reg.create(&teacher, draft(&format!("Ex. {}", n), f.s.id)).await.unwrap().id);
        }
        // Advance the older ones furthest so creation order fights phase order.
        for &id in &ids[0..4] {
            reg.apply_transition(&student, id, Change::to(Status::Processing)).await.unwrap();
        }
        for &id in &ids[0..3] {
            reg.apply_transition(&student, id, Change::to(Status::Finished)).await.unwrap();
        }
        reg.apply_transition(&teacher, ids[0], Change::grade(pts(10))).await.unwrap();

        for list in [
            reg.list_by_student(f.s.id).await.unwrap(),
            reg.list_by_teacher(f.t.id).await.unwrap(),
            reg.list_for(&student).await.unwrap(),
        ] {
            let statuses: Vec<Status> = list.iter().map(|h| h.status).collect();
            assert_eq!(
                vec![
                    Status::New, Status::New, Status::Processing,
                    Status::Finished, Status::Finished, Status::Checked,
                ],
                statuses
            );
        }
    }

    #[tokio::test]
    async fn listings_only_show_your_own() {
        let f = Fixture::new().await;
        let other_t = f.db.insert_teacher(&acct("berro@school.test", "Mr Berro")).await.unwrap();
        let other_s = f.db.insert_student(&acct("kim@school.test", "Kim")).await.unwrap();
        let reg = f.registry();

        reg.create(&Actor::teacher(f.t.id), draft("Mine", f.s.id)).await.unwrap();
        reg.create(&Actor::teacher(other_t.id), draft("Theirs", other_s.id)).await.unwrap();
        reg.create(&Actor::teacher(other_t.id), draft("Theirs, for Sam", f.s.id)).await.unwrap();

        assert_eq!(1, reg.list_for(&Actor::teacher(f.t.id)).await.unwrap().len());
        assert_eq!(2, reg.list_for(&Actor::teacher(other_t.id)).await.unwrap().len());
        assert_eq!(2, reg.list_for(&Actor::student(f.s.id)).await.unwrap().len());
        assert_eq!(1, reg.list_for(&Actor::student(other_s.id)).await.unwrap().len());
    }

    #[tokio::test]
    async fn view_reports_names_and_next_steps() {
        let f = Fixture::new().await;
        let reg = f.registry();
        let teacher = Actor::teacher(f.t.id);
        let student = Actor::student(f.s.id);

        let hw = reg.create(&teacher, draft("Reading 3", f.s.id)).await.unwrap();

        let v = reg.view(&student, hw.id).await.unwrap();
        assert_eq!(Some("Ms Jenny"), v.teacher.as_deref());
        assert_eq!(Some("Sam"), v.student.as_deref());
        assert_eq!((true, false, false), (v.can_start, v.can_finish, v.can_check));

        let v = reg.view(&teacher, hw.id).await.unwrap();
        assert_eq!((false, false, false), (v.can_start, v.can_finish, v.can_check));

        reg.apply_transition(&student, hw.id, Change::to(Status::Processing)).await.unwrap();
        reg.apply_transition(&student, hw.id, Change::to(Status::Finished)).await.unwrap();
        let v = reg.view(&teacher, hw.id).await.unwrap();
        assert_eq!((false, false, true), (v.can_start, v.can_finish, v.can_check));

        let json = serde_json::to_value(&v).unwrap();
        assert_eq!("finished", json["status"]);
        assert_eq!("Reading 3", json["name"]);
    }

    #[tokio::test]
    async fn delete_rules() {
        let f = Fixture::new().await;
        let other_t = f.db.insert_teacher(&acct("berro@school.test", "Mr Berro")).await.unwrap();
        let reg = f.registry();
        let teacher = Actor::teacher(f.t.id);

        let hw = reg.create(&teacher, draft("Reading 4", f.s.id)).await.unwrap();
        assert_eq!(
            Err(HwError::PolicyDenied(DenyReason::NotTeacher)),
            reg.delete(&Actor::student(f.s.id), hw.id).await
        );
        assert_eq!(
            Err(HwError::PolicyDenied(DenyReason::NotAuthor)),
            reg.delete(&Actor::teacher(other_t.id), hw.id).await
        );
        reg.delete(&teacher, hw.id).await.unwrap();
        assert!(matches!(reg.delete(&teacher, hw.id).await, Err(HwError::NotFound(_))));
        assert!(matches!(reg.get(hw.id).await, Err(HwError::NotFound(_))));
    }

    #[tokio::test]
    async fn bulk_deletes_are_scoped() {
        let f = Fixture::new().await;
        let other_s = f.db.insert_student(&acct("kim@school.test", "Kim")).await.unwrap();
        let reg = f.registry();
        let teacher = Actor::teacher(f.t.id);

        reg.create(&teacher, draft("One", f.s.id)).await.unwrap();
        reg.create(&teacher, draft("Two", f.s.id)).await.unwrap();
        reg.create(&teacher, draft("Three", other_s.id)).await.unwrap();

        assert_eq!(2, reg.delete_by_student(f.s.id).await.unwrap());
        assert_eq!(1, reg.list_by_teacher(f.t.id).await.unwrap().len());
        assert_eq!(1, reg.delete_by_teacher(f.t.id).await.unwrap());
        assert!(reg.list_by_student(other_s.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn interleaved_transitions_conflict() {
        use std::sync::atomic::Ordering;
        use crate::store::flaky::Flaky;

        ensure_logging();
        let db = Flaky::new();
        let rec = Recorder::default();
        let t = db.insert_teacher(&acct("jenny@school.test", "Ms Jenny")).await.unwrap();
        let s = db.insert_student(&acct("sam@school.test", "Sam")).await.unwrap();
        let reg = Registry::new(&db, &rec);
        let student = Actor::student(s.id);

        let hw = reg.create(&Actor::teacher(t.id), draft("Reading 2", s.id)).await.unwrap();
        rec.take();

        db.lose_next_update.store(true, Ordering::SeqCst);
        assert!(matches!(
            reg.apply_transition(&student, hw.id, Change::to(Status::Processing)).await,
            Err(HwError::Conflict(_))
        ));
        // The other writer's change stands; ours sent nothing.
        let stored = reg.get(hw.id).await.unwrap();
        assert_eq!((Status::Processing, 1), (stored.status, stored.revision));
        assert!(rec.take().is_empty());

        // Retrying from the fresh state works.
        let hw = reg.apply_transition(&student, hw.id, Change::to(Status::Finished)).await.unwrap();
        assert_eq!((Status::Finished, 2), (hw.status, hw.revision));
    }
}
