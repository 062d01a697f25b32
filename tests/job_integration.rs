mod common;

use std::{
    sync::{
        Arc,
        Mutex,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, Sender},
    },
    thread,
};

use batch_import::{
    BatchError,
    core::{
        item::{ItemProcessorResult, ItemWriter, ItemWriterResult},
        job::{JobBuilder, JobParametersBuilder},
        launcher::{JobLauncher, JobOutcome},
        repository::{InMemoryJobRepository, JobRepository},
        step::StepBuilder,
    },
    import::{ImportJobConfig, ImportJobTrigger},
    item::{
        csv::csv_reader::CsvItemReaderBuilder,
        repository::{InMemoryRepository, Repository, RepositoryItemWriter},
    },
    user::{USER_FIELD_NAMES, UpperCaseNameProcessor, User},
};
use common::{MockUserRepository, init_logger, users_file};

const ROWS: &str = "id,userId,firstName,lastName
1,u1,john,doe
2,u2,jane,roe";

/// Writer signalling the first write and blocking until released.
struct GateWriter {
    started: Sender<()>,
    release: Receiver<()>,
}

impl ItemWriter<User> for GateWriter {
    fn write(&self, _items: &[User]) -> ItemWriterResult {
        self.started
            .send(())
            .map_err(|error| BatchError::ItemWriter(error.to_string()))?;
        self.release
            .recv()
            .map_err(|error| BatchError::ItemWriter(error.to_string()))
    }
}

/// Store whose first save signals and blocks until released.
struct GateRepository {
    store: InMemoryRepository<User>,
    started: Mutex<Option<Sender<()>>>,
    release: Mutex<Option<Receiver<()>>>,
}

impl GateRepository {
    fn new(started: Sender<()>, release: Receiver<()>) -> Self {
        Self {
            store: InMemoryRepository::new(),
            started: Mutex::new(Some(started)),
            release: Mutex::new(Some(release)),
        }
    }
}

impl Repository<User> for GateRepository {
    fn save(&self, item: &User) -> Result<(), BatchError> {
        let started = self.started.lock().unwrap().take();
        if let Some(started) = started {
            started.send(()).unwrap();
            let release = self.release.lock().unwrap().take().unwrap();
            release.recv().unwrap();
        }
        self.store.save(item)
    }
}

fn run_import(
    job_repository: &dyn JobRepository,
    writer: &dyn ItemWriter<User>,
    start_at: i64,
) -> JobOutcome {
    let reader = CsvItemReaderBuilder::new()
        .names(&USER_FIELD_NAMES)
        .lines_to_skip(1)
        .strict(false)
        .from_reader(ROWS.as_bytes());
    let processor = UpperCaseNameProcessor;

    let step = StepBuilder::new("csv-import-step")
        .chunk::<User, User>(10)
        .reader(&reader)
        .processor(&processor)
        .writer(writer)
        .build()
        .unwrap();
    let job = JobBuilder::new().name("importUsers").start(&step).build();

    let parameters = JobParametersBuilder::new()
        .add_long("startAt", start_at)
        .to_job_parameters();
    JobLauncher::new(job_repository).trigger(&job, &parameters)
}

#[test]
fn concurrent_trigger_with_same_parameters_is_rejected() {
    init_logger();
    let job_repository = InMemoryJobRepository::new();
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();

    thread::scope(|scope| {
        let first = scope.spawn(|| {
            let writer = GateWriter {
                started: started_tx,
                release: release_rx,
            };
            run_import(&job_repository, &writer, 42)
        });

        started_rx.recv().unwrap();
        let running = job_repository
            .get_last_status(
                "importUsers",
                &JobParametersBuilder::new().add_long("startAt", 42).to_job_parameters(),
            )
            .is_some_and(|status| status.is_running());
        assert!(running);

        let users: InMemoryRepository<User> = InMemoryRepository::new();
        let writer = RepositoryItemWriter::new(&users);
        let second = run_import(&job_repository, &writer, 42);

        assert!(matches!(
            second,
            JobOutcome::Rejected(BatchError::JobExecutionAlreadyRunning { .. })
        ));
        assert!(second.to_string().starts_with("Job failed with exception: "));
        assert_eq!(users.count(), 0);

        release_tx.send(()).unwrap();
        let first = first.join().unwrap();
        assert!(first.is_completed());
    });
}

#[test]
fn concurrent_triggers_with_different_parameters_both_complete() {
    init_logger();
    let file = users_file(&["1,u1,john,doe", "2,u2,jane,roe", "3,u3,ann,lee"]);
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let users = GateRepository::new(started_tx, release_rx);
    let job_repository = InMemoryJobRepository::new();
    let config = ImportJobConfig {
        resource: file.path().to_path_buf(),
        chunk_size: 2,
        ..ImportJobConfig::default()
    };
    let trigger = ImportJobTrigger::new(config, &job_repository, &users, &users.store).unwrap();

    thread::scope(|scope| {
        let trigger = &trigger;
        let first = scope.spawn(move || trigger.trigger(1));

        started_rx.recv().unwrap();
        let second = trigger.trigger(2);
        assert_eq!(second.to_string(), "COMPLETED");
        assert_eq!(users.store.commit_log(), vec![vec![1, 2], vec![3]]);

        release_tx.send(()).unwrap();
        let first = first.join().unwrap();
        assert_eq!(first.to_string(), "COMPLETED");
    });

    assert_eq!(users.store.count(), 3);
    assert_eq!(users.store.commit_count(), 4);
    assert_eq!(users.store.rollback_count(), 0);
}

#[test]
fn completed_instance_cannot_run_again() {
    let job_repository = InMemoryJobRepository::new();
    let users: InMemoryRepository<User> = InMemoryRepository::new();
    let writer = RepositoryItemWriter::new(&users);

    assert!(run_import(&job_repository, &writer, 1).is_completed());

    let again = run_import(&job_repository, &writer, 1);
    match again {
        JobOutcome::Rejected(BatchError::JobInstanceAlreadyComplete { job_name, .. }) => {
            assert_eq!(job_name, "importUsers")
        }
        other => panic!("unexpected outcome: {}", other),
    }

    assert!(run_import(&job_repository, &writer, 2).is_completed());
}

#[test]
fn failed_instance_can_be_restarted_with_same_parameters() {
    init_logger();
    let file = users_file(&["1,u1,john,doe", "2,u2,jane,roe"]);
    let store = Arc::new(InMemoryRepository::<User>::new());
    let broken = Arc::new(AtomicBool::new(true));

    let mut repository = MockUserRepository::new();
    let inner = Arc::clone(&store);
    let failing = Arc::clone(&broken);
    repository.expect_save().returning(move |user| {
        if failing.load(Ordering::SeqCst) {
            Err(BatchError::ItemWriter("disk full".to_string()))
        } else {
            inner.save(user)
        }
    });

    let job_repository = InMemoryJobRepository::new();
    let config = ImportJobConfig {
        resource: file.path().to_path_buf(),
        ..ImportJobConfig::default()
    };
    let trigger = ImportJobTrigger::new(config, &job_repository, &repository, &*store).unwrap();

    assert_eq!(trigger.trigger(7).to_string(), "FAILED");
    assert_eq!(store.count(), 0);

    broken.store(false, Ordering::SeqCst);

    assert_eq!(trigger.trigger(7).to_string(), "COMPLETED");
    assert_eq!(store.count(), 2);

    let parameters = JobParametersBuilder::new()
        .add_long("startAt", 7)
        .to_job_parameters();
    assert_eq!(job_repository.execution_count("importUsers", &parameters), 2);
}

#[test]
fn parameters_without_start_at_are_invalid() {
    let file = users_file(&["1,u1,john,doe"]);
    let users: InMemoryRepository<User> = InMemoryRepository::new();
    let job_repository = InMemoryJobRepository::new();
    let config = ImportJobConfig {
        resource: file.path().to_path_buf(),
        ..ImportJobConfig::default()
    };
    let trigger = ImportJobTrigger::new(config, &job_repository, &users, &users).unwrap();

    let parameters = JobParametersBuilder::new()
        .add_string("run", "manual")
        .to_job_parameters();
    let outcome = trigger.launch(&parameters);

    assert!(matches!(
        outcome,
        JobOutcome::Rejected(BatchError::InvalidJobParameters(_))
    ));
    assert_eq!(users.count(), 0);
    assert_eq!(job_repository.execution_count("importUsers", &parameters), 0);
}

#[test]
fn closure_processor_drops_users_without_freeing_chunk_slots() {
    let data = "id,userId,firstName,lastName,gender
1,u1,a,a,F
2,u2,b,b,M
3,u3,c,c,F
4,u4,d,d,F
5,u5,e,e,M
6,u6,f,f,F";
    let reader = CsvItemReaderBuilder::new()
        .names(&USER_FIELD_NAMES)
        .lines_to_skip(1)
        .strict(false)
        .from_reader(data.as_bytes());

    let only_women = |user: &User| -> ItemProcessorResult<User> {
        if user.gender == "F" {
            Ok(Some(user.clone()))
        } else {
            Ok(None)
        }
    };

    let users: InMemoryRepository<User> = InMemoryRepository::new();
    let writer = RepositoryItemWriter::new(&users);
    let step = StepBuilder::new("filter-step")
        .chunk::<User, User>(2)
        .reader(&reader)
        .processor(&only_women)
        .writer(&writer)
        .transaction_manager(&users)
        .build()
        .unwrap();
    let job = JobBuilder::new().name("filterUsers").start(&step).build();

    let job_repository = InMemoryJobRepository::new();
    let outcome = JobLauncher::new(&job_repository).trigger(
        &job,
        &JobParametersBuilder::new()
            .add_long("startAt", 1)
            .to_job_parameters(),
    );

    assert!(outcome.is_completed());
    assert_eq!(users.commit_log(), vec![vec![1, 3], vec![4, 6]]);

    let step = &outcome.execution().unwrap().step_executions[0];
    assert_eq!(step.read_count, 6);
    assert_eq!(step.filter_count, 2);
    assert_eq!(step.write_count, 4);
}
