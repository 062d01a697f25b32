//! Mock version of the user repository
use mockall::mock;

use batch_import::{BatchError, item::repository::Repository, user::User};

mock! {
    pub UserRepository {}
    impl Repository<User> for UserRepository {
        fn save(&self, item: &User) -> Result<(), BatchError>;
    }
}
