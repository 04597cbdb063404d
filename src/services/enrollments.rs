use crate::{
    db::DatabaseAccess,
    entities::{
        course::Entity as Course,
        enrollment::{self, Entity as Enrollment},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use futures::future::BoxFuture;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder, Set,
    SqlErr,
};
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

const STATUS_ACTIVE: &str = "active";

/// One deferred enrollment write, executed against the transaction that
/// owns the batch.
pub type EnrollmentOp = Box<
    dyn for<'a> FnOnce(&'a DatabaseTransaction) -> BoxFuture<'a, Result<enrollment::Model, ServiceError>>
        + Send,
>;

/// Outcome of an enrollment batch: either every operation succeeded and
/// `results` holds one model per input in order, or the batch aborted and
/// `errors` carries what stopped it. Nothing is persisted on failure.
#[derive(Debug)]
pub struct BatchOutcome {
    pub success: bool,
    pub results: Vec<enrollment::Model>,
    pub errors: Vec<ServiceError>,
}

/// Service for creating and querying course enrollments
#[derive(Clone)]
pub struct EnrollmentService {
    db: DatabaseAccess,
    event_sender: Option<Arc<EventSender>>,
}

impl EnrollmentService {
    /// Creates a new enrollment service instance
    pub fn new(db: DatabaseAccess, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    /// Inserts a single enrollment inside the caller's transaction.
    ///
    /// The (student, course) pair is checked first so the common duplicate
    /// case reports cleanly; the unique index is the backstop when two
    /// transactions race for the same pair.
    pub async fn create_in_txn(
        txn: &DatabaseTransaction,
        student_id: Uuid,
        course_id: Uuid,
        order_id: Option<Uuid>,
    ) -> Result<enrollment::Model, ServiceError> {
        Course::find_by_id(course_id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Course {} not found", course_id)))?;

        let existing = Enrollment::find()
            .filter(enrollment::Column::StudentId.eq(student_id))
            .filter(enrollment::Column::CourseId.eq(course_id))
            .one(txn)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::DuplicateEnrollment(course_id.to_string()));
        }

        let model = enrollment::ActiveModel {
            id: Set(Uuid::new_v4()),
            student_id: Set(student_id),
            course_id: Set(course_id),
            order_id: Set(order_id),
            status: Set(STATUS_ACTIVE.to_string()),
            enrolled_at: Set(Utc::now()),
        };

        match model.insert(txn).await {
            Ok(created) => Ok(created),
            Err(err) => match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => {
                    Err(ServiceError::DuplicateEnrollment(course_id.to_string()))
                }
                _ => Err(ServiceError::DatabaseError(err)),
            },
        }
    }

    /// Packages one enrollment creation as a deferred operation for batching.
    pub fn enrollment_op(
        &self,
        student_id: Uuid,
        course_id: Uuid,
        order_id: Option<Uuid>,
    ) -> EnrollmentOp {
        Box::new(move |txn| {
            Box::pin(async move { Self::create_in_txn(txn, student_id, course_id, order_id).await })
        })
    }

    /// Runs the operations strictly in order against an open transaction.
    ///
    /// Stops issuing operations at the first error and propagates it, which
    /// rolls the owning transaction back.
    pub async fn run_batch(
        txn: &DatabaseTransaction,
        operations: Vec<EnrollmentOp>,
    ) -> Result<Vec<enrollment::Model>, ServiceError> {
        let mut results = Vec::with_capacity(operations.len());
        for op in operations {
            results.push(op(txn).await?);
        }
        Ok(results)
    }

    /// Executes an enrollment batch as one all-or-nothing transaction.
    ///
    /// Afterwards either every requested enrollment exists or none do.
    #[instrument(skip(self, operations), fields(operation_count = operations.len()))]
    pub async fn create_purchase_enrollments(&self, operations: Vec<EnrollmentOp>) -> BatchOutcome {
        let result = self
            .db
            .transaction::<_, Vec<enrollment::Model>, ServiceError>(move |txn| {
                Box::pin(async move { Self::run_batch(txn, operations).await })
            })
            .await;

        match result {
            Ok(results) => {
                if let Some(event_sender) = &self.event_sender {
                    for created in &results {
                        if let Err(e) = event_sender
                            .send(Event::EnrollmentCreated {
                                student_id: created.student_id,
                                course_id: created.course_id,
                            })
                            .await
                        {
                            warn!(error = %e, "Failed to send enrollment created event");
                        }
                    }
                }
                BatchOutcome {
                    success: true,
                    results,
                    errors: Vec::new(),
                }
            }
            Err(err) => {
                warn!(error = %err, "Enrollment batch aborted");
                BatchOutcome {
                    success: false,
                    results: Vec::new(),
                    errors: vec![err],
                }
            }
        }
    }

    /// Lists a student's enrollments, newest first
    #[instrument(skip(self))]
    pub async fn list_for_student(
        &self,
        student_id: Uuid,
    ) -> Result<Vec<enrollment::Model>, ServiceError> {
        Ok(Enrollment::find()
            .filter(enrollment::Column::StudentId.eq(student_id))
            .order_by_desc(enrollment::Column::EnrolledAt)
            .all(self.db.get_pool())
            .await?)
    }
}
