//! Reconcile engine: walks schools and students and applies directory actions.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::directory::DirectoryService;
use crate::error::{Result, SyncError};
use crate::models::student::{SchoolRecord, StudentRecord};
use crate::models::sync::SchoolScope;
use crate::reconcile::derive::{derive, Derivation, SkipReason};
use crate::reconcile::patch::{build_patch, suspends_account, Action, NoOpReason, PlanWarning};
use crate::source::EnrollmentSource;

/// What happened to a single student during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudentOutcome {
    Skipped(SkipReason),
    Unchanged,
    MissingSuspended,
    Created,
    Updated {
        suspended: bool,
        groups_removed: usize,
        group_failures: usize,
    },
    Failed(String),
}

/// Counters for one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    pub schools_processed: u64,
    pub schools_failed: u64,
    pub students_seen: u64,
    pub accounts_created: u64,
    pub accounts_updated: u64,
    pub accounts_suspended: u64,
    pub groups_left: u64,
    pub skipped: u64,
    pub unchanged: u64,
    pub missing_suspended: u64,
    pub frozen_holds: u64,
    pub errors: u64,
}

impl RunSummary {
    fn new(dry_run: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            dry_run,
            schools_processed: 0,
            schools_failed: 0,
            students_seen: 0,
            accounts_created: 0,
            accounts_updated: 0,
            accounts_suspended: 0,
            groups_left: 0,
            skipped: 0,
            unchanged: 0,
            missing_suspended: 0,
            frozen_holds: 0,
            errors: 0,
        }
    }

    fn record(&mut self, outcome: &StudentOutcome) {
        self.students_seen += 1;
        match outcome {
            StudentOutcome::Skipped(_) => self.skipped += 1,
            StudentOutcome::Unchanged => self.unchanged += 1,
            StudentOutcome::MissingSuspended => self.missing_suspended += 1,
            StudentOutcome::Created => self.accounts_created += 1,
            StudentOutcome::Updated {
                suspended,
                groups_removed,
                group_failures,
            } => {
                self.accounts_updated += 1;
                if *suspended {
                    self.accounts_suspended += 1;
                }
                self.groups_left += *groups_removed as u64;
                self.errors += *group_failures as u64;
            }
            StudentOutcome::Failed(_) => self.errors += 1,
        }
    }
}

/// Drives derivation and patching for every student in scope.
pub struct ReconcileEngine<S: EnrollmentSource, D: DirectoryService> {
    source: Arc<S>,
    directory: Arc<D>,
    config: SyncConfig,
    dry_run: bool,
}

impl<S: EnrollmentSource, D: DirectoryService> ReconcileEngine<S, D> {
    /// Create a new engine. Fails if no initial password is configured.
    pub fn new(source: Arc<S>, directory: Arc<D>, config: SyncConfig) -> Result<Self> {
        if config
            .district
            .new_user_password
            .as_deref()
            .is_none_or(str::is_empty)
        {
            return Err(SyncError::Config(
                "district.new_user_password is not set".into(),
            ));
        }
        Ok(Self {
            source,
            directory,
            config,
            dry_run: false,
        })
    }

    /// When set, lookups still run but no create, update, or removal is sent.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Reconcile every school in `scope` as of `today`.
    pub async fn run(&self, scope: SchoolScope, today: NaiveDate) -> Result<RunSummary> {
        let mut summary = RunSummary::new(self.dry_run);
        let deadline = self.config.sync.deadline();
        info!(
            run_id = %summary.run_id,
            started_at = %summary.started_at,
            scope = %scope,
            dry_run = self.dry_run,
            "starting student account sync"
        );

        let result = tokio::time::timeout(deadline, self.run_schools(&scope, today, &mut summary))
            .await
            .map_err(|_| SyncError::Deadline {
                secs: deadline.as_secs(),
            })
            .and_then(|inner| inner);

        let finished_at = Utc::now();
        summary.finished_at = Some(finished_at);

        match result {
            Ok(()) => {
                info!(
                    run_id = %summary.run_id,
                    finished_at = %finished_at,
                    schools = summary.schools_processed,
                    schools_failed = summary.schools_failed,
                    students = summary.students_seen,
                    created = summary.accounts_created,
                    updated = summary.accounts_updated,
                    suspended = summary.accounts_suspended,
                    groups_left = summary.groups_left,
                    skipped = summary.skipped,
                    errors = summary.errors,
                    dry_run = self.dry_run,
                    "student account sync completed"
                );
                Ok(summary)
            }
            Err(e) => {
                error!(
                    run_id = %summary.run_id,
                    finished_at = %finished_at,
                    error = %e,
                    "student account sync failed"
                );
                Err(e)
            }
        }
    }

    async fn run_schools(
        &self,
        scope: &SchoolScope,
        today: NaiveDate,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let schools = self.source.list_schools(scope).await?;
        let source = self.source.provider_name();
        if schools.is_empty() {
            warn!(scope = %scope, source, "no schools found, check the enrollment mirror");
        } else {
            info!(count = schools.len(), source, "loaded schools");
        }

        for school in &schools {
            info!(
                school = school.school_number,
                name = %school.name,
                "processing school"
            );
            let students = match self.source.list_students(school.school_number).await {
                Ok(students) => students,
                Err(e) => {
                    error!(
                        school = school.school_number,
                        name = %school.name,
                        error = %e,
                        "failed to load students, skipping school"
                    );
                    summary.schools_failed += 1;
                    continue;
                }
            };

            let concurrency = self.config.sync.concurrency.max(1);
            let results: Vec<(StudentOutcome, usize)> = stream::iter(students.iter())
                .map(|student| {
                    let span = info_span!(
                        "student",
                        number = student.student_number,
                        email = %self.config.district.email_for(student.student_number),
                        name = %format!("{} {}", student.first_name, student.last_name)
                    );
                    self.process_student(student, school, today)
                        .instrument(span)
                })
                .buffer_unordered(concurrency)
                .collect()
                .await;

            for (outcome, holds) in &results {
                summary.record(outcome);
                summary.frozen_holds += *holds as u64;
            }
            summary.schools_processed += 1;
        }
        Ok(())
    }

    /// Returns the outcome plus the number of frozen-OU holds.
    async fn process_student(
        &self,
        student: &StudentRecord,
        school: &SchoolRecord,
        today: NaiveDate,
    ) -> (StudentOutcome, usize) {
        match self.reconcile_student(student, school, today).await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "failed to reconcile student");
                (StudentOutcome::Failed(e.to_string()), 0)
            }
        }
    }

    async fn reconcile_student(
        &self,
        student: &StudentRecord,
        school: &SchoolRecord,
        today: NaiveDate,
    ) -> Result<(StudentOutcome, usize)> {
        let district = &self.config.district;
        let desired = match derive(student, school, today, district)? {
            Derivation::Desired(desired) => desired,
            Derivation::Skip(reason) => {
                warn!(?reason, "skipping placeholder student record");
                return Ok((StudentOutcome::Skipped(reason), 0));
            }
        };
        if desired.grace_period_applied {
            warn!(
                graduation_year = student.graduation_year,
                "recent graduate kept active for the summer"
            );
        }
        debug!(
            email = %desired.email,
            suspended = desired.suspended,
            org_unit = %desired.org_unit_path,
            "derived desired state"
        );

        let mut observed = self.directory.lookup_by_email(&desired.email).await?;
        if let Some(current) = observed.as_mut() {
            if suspends_account(&desired, current) {
                current.groups = self.directory.list_group_memberships(&current.email).await?;
            }
        }

        let plan = build_patch(&desired, observed.as_ref(), district);

        let mut holds = 0;
        for warning in &plan.warnings {
            match warning {
                PlanWarning::FrozenOrgUnit {
                    current,
                    desired,
                    frozen,
                } => {
                    holds += 1;
                    warn!(%current, %desired, %frozen, "account is in a frozen OU, not moving it");
                }
                PlanWarning::MissingCustomAttributes => {
                    warn!("account has no synchronization attributes, writing them");
                }
            }
        }

        let mut outcome = StudentOutcome::Unchanged;
        let mut update_failed = false;
        for action in plan.actions {
            match action {
                Action::NoOp(NoOpReason::InSync) => {
                    debug!("account already in sync");
                }
                Action::NoOp(NoOpReason::MissingSuspendedAccount) => {
                    warn!(email = %desired.email, "inactive student has no account, nothing to suspend");
                    outcome = StudentOutcome::MissingSuspended;
                }
                Action::CreateAccount(account) => {
                    info!(
                        email = %account.email,
                        org_unit = %account.org_unit_path,
                        dry_run = self.dry_run,
                        "creating account"
                    );
                    if !self.dry_run {
                        self.directory.create_account(&account).await?;
                    }
                    outcome = StudentOutcome::Created;
                }
                Action::UpdateAccount { email, patch } => {
                    info!(
                        %email,
                        fields = ?patch.changed_fields(),
                        dry_run = self.dry_run,
                        "updating account"
                    );
                    let suspended = patch.suspended == Some(true);
                    outcome = StudentOutcome::Updated {
                        suspended,
                        groups_removed: 0,
                        group_failures: 0,
                    };
                    if !self.dry_run {
                        if let Err(e) = self.directory.update_account(&email, &patch).await {
                            error!(%email, error = %e, "failed to update account");
                            update_failed = true;
                            outcome = StudentOutcome::Failed(e.to_string());
                        }
                    }
                }
                Action::RemoveFromGroups { email, groups } => {
                    if update_failed {
                        warn!(%email, "update failed, leaving group memberships alone");
                        continue;
                    }
                    let mut removed = 0;
                    let mut failures = 0;
                    for group in &groups {
                        info!(%email, group = %group.email, dry_run = self.dry_run, "removing from group");
                        if self.dry_run {
                            removed += 1;
                            continue;
                        }
                        match self.directory.remove_from_group(group, &email).await {
                            Ok(()) => removed += 1,
                            Err(e) => {
                                failures += 1;
                                error!(%email, group = %group.email, error = %e, "failed to remove from group");
                            }
                        }
                    }
                    if let StudentOutcome::Updated {
                        groups_removed,
                        group_failures,
                        ..
                    } = &mut outcome
                    {
                        *groups_removed = removed;
                        *group_failures = failures;
                    }
                }
            }
        }

        Ok((outcome, holds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::account::{
        CustomAttributes, GroupRef, NewAccount, ObservedAccountState, UpdatePatch,
    };
    use crate::models::student::{ENROLL_ACTIVE, ENROLL_WITHDRAWN};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::Mutex;
    use std::time::Duration;

    struct MockSource {
        schools: Vec<SchoolRecord>,
        students: HashMap<i64, Vec<StudentRecord>>,
        failing_school: Option<i64>,
        unreachable: bool,
    }

    #[async_trait]
    impl EnrollmentSource for MockSource {
        async fn list_schools(&self, scope: &SchoolScope) -> Result<Vec<SchoolRecord>> {
            if self.unreachable {
                return Err(SyncError::Config("unable to open database file".into()));
            }
            Ok(self
                .schools
                .iter()
                .filter(|s| match scope {
                    SchoolScope::School(n) => s.school_number == *n,
                    _ => true,
                })
                .cloned()
                .collect())
        }

        async fn list_students(&self, school_number: i64) -> Result<Vec<StudentRecord>> {
            if self.failing_school == Some(school_number) {
                return Err(SyncError::SourceQuery {
                    school: school_number,
                    message: "connection reset".into(),
                });
            }
            Ok(self
                .students
                .get(&school_number)
                .cloned()
                .unwrap_or_default())
        }

        fn provider_name(&self) -> &str {
            "mock"
        }
    }

    #[derive(Default)]
    struct MockDirectory {
        accounts: Mutex<HashMap<String, ObservedAccountState>>,
        groups: Mutex<HashMap<String, Vec<GroupRef>>>,
        created: Mutex<Vec<NewAccount>>,
        updates: Mutex<Vec<(String, UpdatePatch)>>,
        removals: Mutex<Vec<(String, String)>>,
        group_listings: Mutex<Vec<String>>,
        lookups: Mutex<Vec<String>>,
        fail_updates: bool,
        ambiguous: Vec<String>,
        lookup_delay: Option<Duration>,
    }

    impl MockDirectory {
        fn with_account(self, account: ObservedAccountState) -> Self {
            self.accounts
                .lock()
                .unwrap()
                .insert(account.email.clone(), account);
            self
        }

        fn with_groups(self, email: &str, groups: Vec<GroupRef>) -> Self {
            self.groups.lock().unwrap().insert(email.into(), groups);
            self
        }
    }

    #[async_trait]
    impl DirectoryService for MockDirectory {
        async fn lookup_by_email(&self, email: &str) -> Result<Option<ObservedAccountState>> {
            self.lookups.lock().unwrap().push(email.into());
            if let Some(delay) = self.lookup_delay {
                tokio::time::sleep(delay).await;
            }
            if self.ambiguous.iter().any(|e| e == email) {
                return Err(SyncError::LookupAmbiguity {
                    email: email.into(),
                    matches: 2,
                });
            }
            Ok(self.accounts.lock().unwrap().get(email).cloned())
        }

        async fn create_account(&self, account: &NewAccount) -> Result<()> {
            self.created.lock().unwrap().push(account.clone());
            Ok(())
        }

        async fn update_account(&self, email: &str, patch: &UpdatePatch) -> Result<()> {
            if self.fail_updates {
                return Err(SyncError::DirectoryApi {
                    status: 403,
                    message: "Not Authorized to access this resource/api".into(),
                    reason: "forbidden".into(),
                });
            }
            self.updates
                .lock()
                .unwrap()
                .push((email.into(), patch.clone()));
            Ok(())
        }

        async fn list_group_memberships(&self, email: &str) -> Result<Vec<GroupRef>> {
            self.group_listings.lock().unwrap().push(email.into());
            Ok(self
                .groups
                .lock()
                .unwrap()
                .get(email)
                .cloned()
                .unwrap_or_default())
        }

        async fn remove_from_group(&self, group: &GroupRef, email: &str) -> Result<()> {
            if group.email.starts_with("locked") {
                return Err(SyncError::DirectoryApi {
                    status: 400,
                    message: "Missing required field: memberKey".into(),
                    reason: "required".into(),
                });
            }
            self.removals
                .lock()
                .unwrap()
                .push((group.email.clone(), email.into()));
            Ok(())
        }
    }

    fn config() -> SyncConfig {
        let mut config = SyncConfig::generate_default();
        config.district.new_user_password = Some("Welcome-2024".into());
        config
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 1).unwrap()
    }

    fn wgs() -> SchoolRecord {
        SchoolRecord {
            name: "Washington Grade School".into(),
            school_number: 10,
            abbreviation: "WGS".into(),
        }
    }

    fn student(number: i64, status: i32, grade: i32) -> StudentRecord {
        StudentRecord {
            student_number: number,
            first_name: "jane".into(),
            last_name: "doe".into(),
            graduation_year: 2033,
            enroll_status: status,
            school_id: 10,
            grade_level: grade,
        }
    }

    fn observed(number: i64) -> ObservedAccountState {
        ObservedAccountState {
            email: format!("{number}@d118.org"),
            suspended: false,
            org_unit_path: "/D118 Students/WGS Students/3rd".into(),
            given_name: "Jane".into(),
            family_name: "Doe".into(),
            custom_attributes: Some(CustomAttributes {
                homeschool_id: 10,
                graduation_year: 2033,
            }),
            groups: Vec::new(),
        }
    }

    fn source(students: Vec<StudentRecord>) -> MockSource {
        MockSource {
            schools: vec![wgs()],
            students: HashMap::from([(10, students)]),
            failing_school: None,
            unreachable: false,
        }
    }

    fn engine(
        source: MockSource,
        directory: MockDirectory,
    ) -> (ReconcileEngine<MockSource, MockDirectory>, Arc<MockDirectory>) {
        let directory = Arc::new(directory);
        let engine = ReconcileEngine::new(Arc::new(source), directory.clone(), config()).unwrap();
        (engine, directory)
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .with_writer(move || writer.clone())
            .finish();
        (buffer, tracing::subscriber::set_default(subscriber))
    }

    #[test]
    fn engine_requires_password() {
        let mut config = config();
        config.district.new_user_password = None;
        let result = ReconcileEngine::new(
            Arc::new(source(vec![])),
            Arc::new(MockDirectory::default()),
            config,
        );
        assert!(matches!(result, Err(SyncError::Config(_))));
    }

    #[tokio::test]
    async fn creates_missing_active_account() {
        let (engine, directory) = engine(
            source(vec![student(12345, ENROLL_ACTIVE, 3)]),
            MockDirectory::default(),
        );
        let summary = engine.run(SchoolScope::All, today()).await.unwrap();
        assert_eq!(summary.accounts_created, 1);
        assert_eq!(summary.students_seen, 1);
        assert_eq!(summary.schools_processed, 1);
        assert!(summary.finished_at.is_some());

        let created = directory.created.lock().unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].email, "12345@d118.org");
        assert_eq!(created[0].org_unit_path, "/D118 Students/WGS Students/3rd");
        assert_eq!(created[0].password, "Welcome-2024");
    }

    #[tokio::test]
    async fn in_sync_account_makes_no_writes() {
        let (engine, directory) = engine(
            source(vec![student(12345, ENROLL_ACTIVE, 3)]),
            MockDirectory::default().with_account(observed(12345)),
        );
        let summary = engine.run(SchoolScope::All, today()).await.unwrap();
        assert_eq!(summary.unchanged, 1);
        assert!(directory.updates.lock().unwrap().is_empty());
        assert!(directory.group_listings.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn withdrawn_student_is_suspended_and_leaves_groups() {
        let groups = vec![
            GroupRef {
                email: "wgs-3rd@d118.org".into(),
                name: "WGS 3rd".into(),
            },
            GroupRef {
                email: "choir@d118.org".into(),
                name: "Choir".into(),
            },
        ];
        let (engine, directory) = engine(
            source(vec![student(12345, ENROLL_WITHDRAWN, 3)]),
            MockDirectory::default()
                .with_account(observed(12345))
                .with_groups("12345@d118.org", groups),
        );
        let summary = engine.run(SchoolScope::All, today()).await.unwrap();
        assert_eq!(summary.accounts_updated, 1);
        assert_eq!(summary.accounts_suspended, 1);
        assert_eq!(summary.groups_left, 2);

        let updates = directory.updates.lock().unwrap();
        assert_eq!(updates[0].1.suspended, Some(true));
        assert_eq!(
            updates[0].1.org_unit_path.as_deref(),
            Some("/Suspended Accounts")
        );
        let removals = directory.removals.lock().unwrap();
        assert_eq!(removals.len(), 2);
        assert!(removals.iter().all(|(_, email)| email == "12345@d118.org"));
    }

    #[tokio::test]
    async fn group_removal_failures_are_counted_but_do_not_stop_others() {
        let groups = vec![
            GroupRef {
                email: "locked-staff@d118.org".into(),
                name: "Locked".into(),
            },
            GroupRef {
                email: "choir@d118.org".into(),
                name: "Choir".into(),
            },
        ];
        let (engine, directory) = engine(
            source(vec![student(12345, ENROLL_WITHDRAWN, 3)]),
            MockDirectory::default()
                .with_account(observed(12345))
                .with_groups("12345@d118.org", groups),
        );
        let summary = engine.run(SchoolScope::All, today()).await.unwrap();
        assert_eq!(summary.groups_left, 1);
        assert_eq!(summary.errors, 1);
        assert_eq!(directory.removals.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_update_skips_group_removal() {
        let mut directory = MockDirectory::default()
            .with_account(observed(12345))
            .with_groups(
                "12345@d118.org",
                vec![GroupRef {
                    email: "choir@d118.org".into(),
                    name: "Choir".into(),
                }],
            );
        directory.fail_updates = true;
        let (engine, directory) = engine(source(vec![student(12345, ENROLL_WITHDRAWN, 3)]), directory);
        let summary = engine.run(SchoolScope::All, today()).await.unwrap();
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.accounts_updated, 0);
        assert!(directory.removals.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_suspended_account_is_not_created() {
        let (engine, directory) = engine(
            source(vec![student(12345, ENROLL_WITHDRAWN, 3)]),
            MockDirectory::default(),
        );
        let summary = engine.run(SchoolScope::All, today()).await.unwrap();
        assert_eq!(summary.missing_suspended, 1);
        assert!(directory.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn dry_run_looks_up_but_never_writes() {
        let (engine, directory) = engine(
            source(vec![
                student(1, ENROLL_ACTIVE, 3),
                student(2, ENROLL_WITHDRAWN, 3),
            ]),
            MockDirectory::default()
                .with_account(observed(2))
                .with_groups(
                    "2@d118.org",
                    vec![GroupRef {
                        email: "choir@d118.org".into(),
                        name: "Choir".into(),
                    }],
                ),
        );
        let engine = engine.with_dry_run(true);
        let summary = engine.run(SchoolScope::All, today()).await.unwrap();
        assert!(summary.dry_run);
        assert_eq!(summary.accounts_created, 1);
        assert_eq!(summary.accounts_suspended, 1);
        assert_eq!(summary.groups_left, 1);
        assert!(directory.created.lock().unwrap().is_empty());
        assert!(directory.updates.lock().unwrap().is_empty());
        assert!(directory.removals.lock().unwrap().is_empty());
        assert_eq!(directory.group_listings.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn per_student_errors_do_not_stop_the_school() {
        let mut directory = MockDirectory::default();
        directory.ambiguous = vec!["3@d118.org".into()];
        let (engine, directory) = engine(
            source(vec![
                student(1, ENROLL_ACTIVE, 3),
                student(2, ENROLL_ACTIVE, 42),
                student(3, ENROLL_ACTIVE, 3),
            ]),
            directory,
        );
        let summary = engine.run(SchoolScope::All, today()).await.unwrap();
        assert_eq!(summary.students_seen, 3);
        assert_eq!(summary.errors, 2);
        assert_eq!(summary.accounts_created, 1);
        assert_eq!(directory.created.lock().unwrap()[0].email, "1@d118.org");
    }

    #[tokio::test]
    async fn placeholder_records_are_skipped() {
        let mut placeholder = student(7, ENROLL_ACTIVE, 3);
        placeholder.first_name = "Test".into();
        let (engine, directory) = engine(source(vec![placeholder]), MockDirectory::default());
        let summary = engine.run(SchoolScope::All, today()).await.unwrap();
        assert_eq!(summary.skipped, 1);
        assert!(directory.lookups.lock().unwrap().is_empty());
        assert!(directory.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn frozen_ou_holds_are_counted() {
        let mut frozen = observed(12345);
        frozen.org_unit_path = "/Restricted/SpecialCase".into();
        let (engine, directory) = engine(
            source(vec![student(12345, ENROLL_ACTIVE, 3)]),
            MockDirectory::default().with_account(frozen),
        );
        let summary = engine.run(SchoolScope::All, today()).await.unwrap();
        assert_eq!(summary.frozen_holds, 1);
        assert_eq!(summary.unchanged, 1);
        assert!(directory.updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failing_school_is_counted_and_run_continues() {
        let mut source = source(vec![student(12345, ENROLL_ACTIVE, 3)]);
        source.schools.insert(
            0,
            SchoolRecord {
                name: "Wauconda High School".into(),
                school_number: 5,
                abbreviation: "WHS".into(),
            },
        );
        source.failing_school = Some(5);
        let (engine, directory) = engine(source, MockDirectory::default());
        let summary = engine.run(SchoolScope::All, today()).await.unwrap();
        assert_eq!(summary.schools_failed, 1);
        assert_eq!(summary.schools_processed, 1);
        assert_eq!(directory.created.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn many_students_processed_concurrently() {
        let students: Vec<StudentRecord> = (1..=25).map(|n| student(n, ENROLL_ACTIVE, 3)).collect();
        let (engine, directory) = engine(source(students), MockDirectory::default());
        let summary = engine.run(SchoolScope::School(10), today()).await.unwrap();
        assert_eq!(summary.accounts_created, 25);
        assert_eq!(directory.created.lock().unwrap().len(), 25);
    }

    #[tokio::test]
    async fn student_failures_are_logged_with_identity() {
        let (logs, _guard) = capture_logs();
        let mut directory = MockDirectory::default();
        directory.ambiguous = vec!["3@d118.org".into()];
        let (engine, _) = engine(source(vec![student(3, ENROLL_ACTIVE, 3)]), directory);
        let summary = engine.run(SchoolScope::All, today()).await.unwrap();
        assert_eq!(summary.errors, 1);

        let output = logs.contents();
        let line = output
            .lines()
            .find(|l| l.contains("failed to reconcile student"))
            .unwrap();
        assert!(line.contains("number=3"));
        assert!(line.contains("email=3@d118.org"));
        assert!(line.contains("name=jane doe"));
        assert!(output.contains("source=\"mock\""));
    }

    #[tokio::test]
    async fn empty_school_list_warns_and_succeeds() {
        let (logs, _guard) = capture_logs();
        let mut source = source(vec![]);
        source.schools.clear();
        let (engine, directory) = engine(source, MockDirectory::default());
        let summary = engine.run(SchoolScope::All, today()).await.unwrap();
        assert_eq!(summary.schools_processed, 0);
        assert_eq!(summary.students_seen, 0);
        assert!(directory.lookups.lock().unwrap().is_empty());
        assert!(logs.contents().contains("no schools found"));
    }

    #[tokio::test]
    async fn school_listing_failure_fails_the_run() {
        let mut source = source(vec![student(12345, ENROLL_ACTIVE, 3)]);
        source.unreachable = true;
        let (engine, directory) = engine(source, MockDirectory::default());
        let result = engine.run(SchoolScope::All, today()).await;
        assert!(matches!(result, Err(SyncError::Config(_))));
        assert!(directory.lookups.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn run_past_deadline_is_aborted() {
        let mut config = config();
        config.sync.deadline_secs = 1;
        let directory = Arc::new(MockDirectory {
            lookup_delay: Some(Duration::from_secs(5)),
            ..MockDirectory::default()
        });
        let engine = ReconcileEngine::new(
            Arc::new(source(vec![student(12345, ENROLL_ACTIVE, 3)])),
            directory.clone(),
            config,
        )
        .unwrap();

        let result = engine.run(SchoolScope::All, today()).await;
        assert!(matches!(result, Err(SyncError::Deadline { secs: 1 })));
        assert_eq!(directory.lookups.lock().unwrap().len(), 1);
        assert!(directory.created.lock().unwrap().is_empty());
    }
}
