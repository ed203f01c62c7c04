/*!
Who may do what to a homework.

Everything here is a pure function of the actor and the homework as it
currently stands; nothing is looked up or written. A `Deny` means the
requested mutation must not be applied at all.
*/
use crate::{
    error::HwError,
    homework::{Homework, Status},
    user::{Actor, Role},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    View,
    /// Move the homework to the given status.
    Transition(Status),
    Delete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DenyReason {
    /// Only teachers create, delete, or grade homework.
    NotTeacher,
    /// Teacher trying to act as a student.
    NotStudent,
    /// Teacher acting on homework somebody else authored.
    NotAuthor,
    /// Student acting on homework assigned to somebody else.
    NotAssignee,
    /// The transition exists, but belongs to the other role.
    WrongRole { from: Status, to: Status },
    IllegalTransition { from: Status, to: Status },
    /// Nothing happens after `checked`.
    Terminal,
}

impl DenyReason {
    /// Stable, machine-readable code for callers.
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::NotTeacher => "not-teacher",
            DenyReason::NotStudent => "not-student",
            DenyReason::NotAuthor => "not-author",
            DenyReason::NotAssignee => "not-assignee",
            DenyReason::WrongRole { .. } => "wrong-role",
            DenyReason::IllegalTransition { .. } => "illegal-transition",
            DenyReason::Terminal => "terminal",
        }
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DenyReason::NotTeacher => write!(f, "only teachers may do that"),
            DenyReason::NotStudent => write!(f, "only students may do that"),
            DenyReason::NotAuthor => write!(f, "homework was assigned by another teacher"),
            DenyReason::NotAssignee => write!(f, "homework is assigned to another student"),
            DenyReason::WrongRole { from, to } => write!(
                f, "moving homework from {} to {} is not yours to do", from, to
            ),
            DenyReason::IllegalTransition { from, to } => write!(
                f, "homework can't move from {} to {}", from, to
            ),
            DenyReason::Terminal => write!(f, "homework has already been checked"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn into_result(self) -> Result<(), HwError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(r) => Err(HwError::PolicyDenied(r)),
        }
    }
}

/// Teachers may create homework for any existing student, paired or not.
pub fn may_create(actor: &Actor) -> Decision {
    match actor.role {
        Role::Teacher => Decision::Allow,
        Role::Student => Decision::Deny(DenyReason::NotTeacher),
    }
}

fn ownership(actor: &Actor, hw: &Homework) -> Decision {
    match actor.role {
        Role::Teacher if hw.teacher_id == actor.id => Decision::Allow,
        Role::Teacher => Decision::Deny(DenyReason::NotAuthor),
        Role::Student if hw.student_id == actor.id => Decision::Allow,
        Role::Student => Decision::Deny(DenyReason::NotAssignee),
    }
}

pub fn authorize(actor: &Actor, action: Action, hw: &Homework) -> Decision {
    if let Decision::Deny(r) = ownership(actor, hw) {
        return Decision::Deny(r);
    }

    match action {
        Action::View => Decision::Allow,
        Action::Delete => match actor.role {
            Role::Teacher => Decision::Allow,
            Role::Student => Decision::Deny(DenyReason::NotTeacher),
        },
        Action::Transition(to) => {
            let from = hw.status;
            if from.is_terminal() {
                Decision::Deny(DenyReason::Terminal)
            } else if from.allows(actor.role, to) {
                Decision::Allow
            } else if [Role::Teacher, Role::Student].iter().any(|&r| from.allows(r, to)) {
                Decision::Deny(DenyReason::WrongRole { from, to })
            } else {
                Decision::Deny(DenyReason::IllegalTransition { from, to })
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::homework::sample;

    const T: i64 = 1;
    const OTHER_T: i64 = 2;
    const S: i64 = 10;
    const OTHER_S: i64 = 11;

    #[test]
    fn only_teachers_create() {
        assert_eq!(Decision::Allow, may_create(&Actor::teacher(T)));
        assert_eq!(
            Decision::Deny(DenyReason::NotTeacher),
            may_create(&Actor::student(S))
        );
    }

    #[test]
    fn viewing_needs_author_or_assignee() {
        let hw = sample(1, Status::New, T, S);
        assert!(authorize(&Actor::teacher(T), Action::View, &hw).is_allowed());
        assert!(authorize(&Actor::student(S), Action::View, &hw).is_allowed());
        assert_eq!(
            Decision::Deny(DenyReason::NotAuthor),
            authorize(&Actor::teacher(OTHER_T), Action::View, &hw)
        );
        assert_eq!(
            Decision::Deny(DenyReason::NotAssignee),
            authorize(&Actor::student(OTHER_S), Action::View, &hw)
        );
    }

    #[test]
    fn student_moves_only_their_own_homework() {
        let hw = sample(1, Status::New, T, S);
        let to_processing = Action::Transition(Status::Processing);

        assert!(authorize(&Actor::student(S), to_processing, &hw).is_allowed());
        assert_eq!(
            Decision::Deny(DenyReason::NotAssignee),
            authorize(&Actor::student(OTHER_S), to_processing, &hw)
        );

        let hw = sample(1, Status::Processing, T, S);
        assert!(authorize(&Actor::student(S), Action::Transition(Status::Finished), &hw).is_allowed());
    }

    #[test]
    fn teacher_grades_only_their_own_homework() {
        let hw = sample(1, Status::Finished, T, S);
        let to_checked = Action::Transition(Status::Checked);

        assert!(authorize(&Actor::teacher(T), to_checked, &hw).is_allowed());
        assert_eq!(
            Decision::Deny(DenyReason::NotAuthor),
            authorize(&Actor::teacher(OTHER_T), to_checked, &hw)
        );
    }

    #[test]
    fn roles_stay_in_their_lane() {
        let finished = sample(1, Status::Finished, T, S);
        assert_eq!(
            Decision::Deny(DenyReason::WrongRole { from: Status::Finished, to: Status::Checked }),
            authorize(&Actor::student(S), Action::Transition(Status::Checked), &finished)
        );

        let new = sample(2, Status::New, T, S);
        assert_eq!(
            Decision::Deny(DenyReason::WrongRole { from: Status::New, to: Status::Processing }),
            authorize(&Actor::teacher(T), Action::Transition(Status::Processing), &new)
        );
    }

    #[test]
    fn no_skipping_and_no_going_back() {
        let new = sample(1, Status::New, T, S);
        assert_eq!(
            Decision::Deny(DenyReason::IllegalTransition { from: Status::New, to: Status::Finished }),
            authorize(&Actor::student(S), Action::Transition(Status::Finished), &new)
        );

        let finished = sample(2, Status::Finished, T, S);
        assert_eq!(
            Decision::Deny(DenyReason::IllegalTransition { from: Status::Finished, to: Status::New }),
            authorize(&Actor::teacher(T), Action::Transition(Status::New), &finished)
        );
    }

    #[test]
    fn checked_homework_is_frozen() {
        let hw = sample(1, Status::Checked, T, S);
        for to in Status::ALL {
            assert_eq!(
                Decision::Deny(DenyReason::Terminal),
                authorize(&Actor::teacher(T), Action::Transition(to), &hw)
            );
            assert_eq!(
                Decision::Deny(DenyReason::Terminal),
                authorize(&Actor::student(S), Action::Transition(to), &hw)
            );
        }
    }

    #[test]
    fn only_the_author_deletes() {
        let hw = sample(1, Status::Processing, T, S);
        assert!(authorize(&Actor::teacher(T), Action::Delete, &hw).is_allowed());
        assert_eq!(
            Decision::Deny(DenyReason::NotAuthor),
            authorize(&Actor::teacher(OTHER_T), Action::Delete, &hw)
        );
        assert_eq!(
            Decision::Deny(DenyReason::NotTeacher),
            authorize(&Actor::student(S), Action::Delete, &hw)
        );
    }

    #[test]
    fn deny_converts_to_policy_error() {
        let hw = sample(1, Status::New, T, S);
        let err = authorize(&Actor::student(OTHER_S), Action::View, &hw)
            .into_result()
            .unwrap_err();
        assert_eq!(HwError::PolicyDenied(DenyReason::NotAssignee), err);
    }
}
