use serde::{Deserialize, Serialize};

use crate::{
    core::item::{ItemProcessor, ItemProcessorResult},
    item::repository::Identifiable,
};

/// Column names of a user line, in file order.
pub const USER_FIELD_NAMES: [&str; 9] = [
    "id",
    "userId",
    "firstName",
    "lastName",
    "gender",
    "email",
    "phone",
    "dateOfBirth",
    "jobTitle",
];

/// Table receiving imported users.
pub const USERS_TABLE: &str = "tbl_users";

/// A user as imported from the source file.
///
/// Every attribute but `id` is kept as raw text; a missing value is an empty
/// string.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub gender: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: String,
    pub job_title: String,
}

impl Identifiable for User {
    type Id = i64;

    fn id(&self) -> i64 {
        self.id
    }
}

/// Processor upper-casing the first and last name of a user.
///
/// Never drops a user, and applying it twice gives the same result as
/// applying it once.
#[derive(Default, Clone, Copy)]
pub struct UpperCaseNameProcessor;

impl ItemProcessor<User, User> for UpperCaseNameProcessor {
    fn process(&self, item: &User) -> ItemProcessorResult<User> {
        Ok(Some(User {
            first_name: item.first_name.to_uppercase(),
            last_name: item.last_name.to_uppercase(),
            ..item.clone()
        }))
    }
}

#[cfg(feature = "rdbc-sqlite")]
pub use self::sqlite::{USER_COLUMNS, UserBinder};

#[cfg(feature = "rdbc-sqlite")]
mod sqlite {
    use sqlx::{Sqlite, query_builder::Separated};

    use super::User;
    use crate::item::rdbc::DatabaseItemBinder;

    /// Columns of the users table, in the order [`UserBinder`] binds them.
    pub const USER_COLUMNS: [&str; 9] = [
        "id",
        "user_id",
        "first_name",
        "last_name",
        "gender",
        "email",
        "phone",
        "date_of_birth",
        "job_title",
    ];

    /// Binds the values of a user in [`USER_COLUMNS`] order.
    #[derive(Default, Clone, Copy)]
    pub struct UserBinder;

    impl DatabaseItemBinder<User, Sqlite> for UserBinder {
        fn bind(&self, item: &User, mut query_builder: Separated<Sqlite, &str>) {
            query_builder.push_bind(item.id);
            query_builder.push_bind(item.user_id.clone());
            query_builder.push_bind(item.first_name.clone());
            query_builder.push_bind(item.last_name.clone());
            query_builder.push_bind(item.gender.clone());
            query_builder.push_bind(item.email.clone());
            query_builder.push_bind(item.phone.clone());
            query_builder.push_bind(item.date_of_birth.clone());
            query_builder.push_bind(item.job_title.clone());
        }
    }
}
