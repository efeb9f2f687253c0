//! Role and ownership based permission checks.

use crate::models::{Status, User};
use crate::record::Record;

/// Whether `user` created, manages or is credited on `record`.
pub fn is_owner<R: Record>(user: &User, record: &R) -> bool {
    let common = record.common();
    if common.creator_id.as_deref() == Some(user.id.as_str())
        || common.user_id.as_deref() == Some(user.id.as_str())
    {
        return true;
    }
    match &user.person_id {
        Some(person_id) => record.person_ids().contains(&person_id.as_str()),
        None => false,
    }
}

pub fn can_view<R: Record>(user: &User, record: &R) -> bool {
    user.can_curate() || (record.status() != Status::Deleted && is_owner(user, record))
}

pub fn can_edit<R: Record>(user: &User, record: &R) -> bool {
    if record.status() == Status::Deleted {
        return false;
    }
    if user.can_curate() {
        return true;
    }
    !record.common().locked && is_owner(user, record)
}

pub fn can_publish<R: Record>(user: &User, record: &R) -> bool {
    can_edit(user, record)
        && matches!(
            record.status(),
            Status::New | Status::Private | Status::Returned
        )
}

pub fn can_withdraw<R: Record>(user: &User, record: &R) -> bool {
    can_edit(user, record) && record.status() == Status::Public
}

pub fn can_republish<R: Record>(user: &User, record: &R) -> bool {
    can_edit(user, record)
        && record.status() == Status::Returned
        && record.common().has_been_public
}

pub fn can_delete<R: Record>(user: &User, record: &R) -> bool {
    if record.status() == Status::Deleted {
        return false;
    }
    user.can_curate() || (can_edit(user, record) && !record.common().has_been_public)
}

/// Reviewer notes/tags, locking and type or classification changes.
pub fn can_curate_fields(user: &User) -> bool {
    user.can_curate()
}
