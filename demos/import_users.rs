use std::path::PathBuf;

use anyhow::Result;
use log::info;

use batch_import::{
    core::repository::InMemoryJobRepository,
    import::{ImportJobConfig, ImportJobTrigger},
    item::repository::InMemoryRepository,
    user::User,
};

fn main() -> Result<()> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => ImportJobConfig::from_path(path)?,
        None => ImportJobConfig {
            resource: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/data/users.csv"),
            ..ImportJobConfig::default()
        },
    };

    let users: InMemoryRepository<User> = InMemoryRepository::new();
    let job_repository = InMemoryJobRepository::new();
    let trigger = ImportJobTrigger::new(config, &job_repository, &users, &users)?;

    // Each call synthesizes a new startAt, so both runs are new instances
    for _ in 0..2 {
        println!("{}", trigger.import_data());
        std::thread::sleep(std::time::Duration::from_millis(2));
    }

    for user in users.find_all() {
        info!(
            "{} {} {} <{}>",
            user.id, user.first_name, user.last_name, user.email
        );
    }
    println!(
        "{} users stored in {} commits",
        users.count(),
        users.commit_count()
    );

    Ok(())
}
