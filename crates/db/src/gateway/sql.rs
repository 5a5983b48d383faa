use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};

use tradeflow_core::domain::approval::{ApprovalFilter, ApprovalRecord};
use tradeflow_core::domain::kind::ApprovalKind;
use tradeflow_core::domain::parcel::{ParcelChange, ParcelRecord, ParcelRevocation};
use tradeflow_core::domain::pending::{PendingApprovalItem, PendingApprovalQuery};
use tradeflow_core::pagination::{SortColumn, SortOrder};

use super::{
    decision_time, missing_parcel_message, GatewayReply, ManageAction, ManageCall, PendingPage,
    PersistenceGateway, ReferenceCheck,
};
use crate::repositories::RepositoryError;
use crate::DbPool;

/// Row scope applied to every read: soft-deleted rows are invisible.
const ACTIVE: &str = "is_deleted = 0";

fn active_on(alias: &str) -> String {
    format!("{alias}.{ACTIVE}")
}

pub(crate) fn encode_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("{column}: {error}")))
}

fn decode_optional_timestamp(
    column: &str,
    raw: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    raw.map(|value| decode_timestamp(column, &value)).transpose()
}

fn sort_column_sql(column: SortColumn) -> &'static str {
    match column {
        SortColumn::EntityId => "entity_id",
        SortColumn::ApproverId => "approver_id",
        SortColumn::ApprovedYn => "approved_yn",
        SortColumn::ApproverDateTime => "approver_date_time",
        SortColumn::CreatedDateTime => "created_date_time",
    }
}

fn order_by(sort: SortOrder) -> String {
    format!(
        " ORDER BY {} {}, entity_id ASC, approver_id ASC",
        sort_column_sql(sort.column),
        sort.direction.as_sql()
    )
}

/// SQLite-backed gateway. Each manage call runs in its own transaction.
#[derive(Clone)]
pub struct SqlGateway {
    pool: DbPool,
}

impl SqlGateway {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn select(&self, call: &ManageCall) -> Result<GatewayReply, RepositoryError> {
        let kind = call.kind;
        let filter = call.filter();
        let mut tx = self.pool.begin().await?;

        let Some(window) = call.params.window else {
            let mut query = select_records(kind, filter);
            query.push(order_by(SortOrder::default()));
            let rows = query.build().fetch_all(&mut *tx).await?;
            tx.commit().await?;
            let records = rows.iter().map(row_to_record).collect::<Result<Vec<_>, _>>()?;
            let total = records.len() as u64;
            return Ok(GatewayReply::rows(records, Some(total)));
        };

        let mut count = QueryBuilder::<Sqlite>::new(format!(
            "SELECT COUNT(*) FROM {} WHERE {ACTIVE}",
            kind.approval_table()
        ));
        push_filter(&mut count, kind, filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&mut *tx).await?;

        let mut query = select_records(kind, filter);
        query.push(order_by(window.sort));
        query.push(" LIMIT ");
        query.push_bind(i64::from(window.page.page_size()));
        query.push(" OFFSET ");
        query.push_bind(i64::try_from(window.page.offset()).unwrap_or(i64::MAX));
        let rows = query.build().fetch_all(&mut *tx).await?;
        tx.commit().await?;

        let records = rows.iter().map(row_to_record).collect::<Result<Vec<_>, _>>()?;
        let total = u64::try_from(total)
            .map_err(|_| RepositoryError::Decode(format!("negative row count {total}")))?;
        Ok(GatewayReply::rows(records, Some(total)))
    }

    /// One conditional statement: the active-pair check and the insert share the write lock,
    /// so concurrent creates wait on `busy_timeout` instead of failing a lock upgrade.
    async fn insert(&self, call: &ManageCall) -> Result<GatewayReply, RepositoryError> {
        let kind = call.kind;
        let key = call.key()?;
        let created_by_id = call.acting_user_id()?;
        let now = Utc::now();
        let decided_at = decision_time(call.params.approved_yn, call.params.approver_date_time, now);

        let result = sqlx::query(&format!(
            "INSERT INTO {table} ({column}, approver_id, approved_yn, approver_date_time, form_name,
                                  role_name, created_by_id, created_date_time, is_deleted)
             SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0
             WHERE NOT EXISTS (
                 SELECT 1 FROM {table} WHERE {column} = ?1 AND approver_id = ?2 AND {ACTIVE})",
            table = kind.approval_table(),
            column = kind.entity_column()
        ))
        .bind(key.entity_id)
        .bind(key.approver_id)
        .bind(call.params.approved_yn)
        .bind(decided_at.map(encode_timestamp))
        .bind(call.params.form_name.as_deref())
        .bind(call.params.role_name.as_deref())
        .bind(created_by_id)
        .bind(encode_timestamp(now))
        .execute(&self.pool)
        .await;

        let duplicate = || {
            GatewayReply::rejected(format!(
                "Approval already exists for {} {} and ApproverID {}",
                kind.entity_field(),
                key.entity_id,
                key.approver_id
            ))
        };
        match result {
            Ok(done) if done.rows_affected() == 0 => Ok(duplicate()),
            Ok(_) => {
                Ok(GatewayReply::ok(format!("{} approval created successfully", kind.form_name())))
            }
            Err(sqlx::Error::Database(error)) if error.is_unique_violation() => Ok(duplicate()),
            Err(error) => Err(error.into()),
        }
    }

    async fn update(&self, call: &ManageCall) -> Result<GatewayReply, RepositoryError> {
        let kind = call.kind;
        let key = call.key()?;
        let updated_by_id = call.acting_user_id()?;
        let now = Utc::now();
        let decided_at = decision_time(call.params.approved_yn, call.params.approver_date_time, now);

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(&format!(
            "UPDATE {}
             SET approved_yn = ?1,
                 approver_date_time = ?2,
                 form_name = COALESCE(?3, form_name),
                 role_name = COALESCE(?4, role_name),
                 updated_by_id = ?5,
                 updated_date_time = ?6
             WHERE {} = ?7 AND approver_id = ?8 AND {ACTIVE}",
            kind.approval_table(),
            kind.entity_column()
        ))
        .bind(call.params.approved_yn)
        .bind(decided_at.map(encode_timestamp))
        .bind(call.params.form_name.as_deref())
        .bind(call.params.role_name.as_deref())
        .bind(updated_by_id)
        .bind(encode_timestamp(now))
        .bind(key.entity_id)
        .bind(key.approver_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(GatewayReply::rejected(missing_row_message(kind, key)));
        }
        tx.commit().await?;

        Ok(GatewayReply::ok(format!("{} approval updated successfully", kind.form_name())))
    }

    async fn delete(&self, call: &ManageCall) -> Result<GatewayReply, RepositoryError> {
        let kind = call.kind;
        let key = call.key()?;
        let deleted_by_id = call.acting_user_id()?;

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(&format!(
            "UPDATE {}
             SET is_deleted = 1, deleted_by_id = ?1, deleted_date_time = ?2
             WHERE {} = ?3 AND approver_id = ?4 AND {ACTIVE}",
            kind.approval_table(),
            kind.entity_column()
        ))
        .bind(deleted_by_id)
        .bind(encode_timestamp(Utc::now()))
        .bind(key.entity_id)
        .bind(key.approver_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(GatewayReply::rejected(missing_row_message(kind, key)));
        }
        tx.commit().await?;

        Ok(GatewayReply::ok(format!("{} approval deleted successfully", kind.form_name())))
    }
}

fn missing_row_message(
    kind: ApprovalKind,
    key: tradeflow_core::domain::approval::ApprovalKey,
) -> String {
    format!(
        "No active approval exists for {} {} and ApproverID {}",
        kind.entity_field(),
        key.entity_id,
        key.approver_id
    )
}

fn select_records(kind: ApprovalKind, filter: ApprovalFilter) -> QueryBuilder<'static, Sqlite> {
    let mut query = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} AS entity_id, approver_id, approved_yn, approver_date_time, form_name,
                role_name, created_by_id, created_date_time, updated_by_id, updated_date_time
         FROM {} WHERE {ACTIVE}",
        kind.entity_column(),
        kind.approval_table()
    ));
    push_filter(&mut query, kind, filter);
    query
}

fn push_filter(query: &mut QueryBuilder<'static, Sqlite>, kind: ApprovalKind, filter: ApprovalFilter) {
    if let Some(entity_id) = filter.entity_id {
        query.push(format!(" AND {} = ", kind.entity_column()));
        query.push_bind(entity_id);
    }
    if let Some(approver_id) = filter.approver_id {
        query.push(" AND approver_id = ");
        query.push_bind(approver_id);
    }
}

fn row_to_parcel(row: &SqliteRow) -> Result<ParcelRecord, RepositoryError> {
    let decode = |error: sqlx::Error| RepositoryError::Decode(error.to_string());

    let created_date_time: String = row.try_get("created_date_time").map_err(decode)?;
    Ok(ParcelRecord {
        parcel_id: row.try_get("parcel_id").map_err(decode)?,
        sales_quotation_id: row.try_get("sales_quotation_id").map_err(decode)?,
        parcel_number: row.try_get("parcel_number").map_err(decode)?,
        item_quantity: row.try_get("item_quantity").map_err(decode)?,
        gross_weight_grams: row.try_get("gross_weight_grams").map_err(decode)?,
        notes: row.try_get("notes").map_err(decode)?,
        created_by_id: row.try_get("created_by_id").map_err(decode)?,
        created_date_time: decode_timestamp("created_date_time", &created_date_time)?,
        updated_by_id: row.try_get("updated_by_id").map_err(decode)?,
        updated_date_time: decode_optional_timestamp(
            "updated_date_time",
            row.try_get("updated_date_time").map_err(decode)?,
        )?,
    })
}

fn row_to_record(row: &SqliteRow) -> Result<ApprovalRecord, RepositoryError> {
    let decode = |error: sqlx::Error| RepositoryError::Decode(error.to_string());

    let created_date_time: String = row.try_get("created_date_time").map_err(decode)?;
    Ok(ApprovalRecord {
        entity_id: row.try_get("entity_id").map_err(decode)?,
        approver_id: row.try_get("approver_id").map_err(decode)?,
        approved_yn: row.try_get("approved_yn").map_err(decode)?,
        approver_date_time: decode_optional_timestamp(
            "approver_date_time",
            row.try_get("approver_date_time").map_err(decode)?,
        )?,
        form_name: row.try_get("form_name").map_err(decode)?,
        role_name: row.try_get("role_name").map_err(decode)?,
        created_by_id: row.try_get("created_by_id").map_err(decode)?,
        created_date_time: decode_timestamp("created_date_time", &created_date_time)?,
        updated_by_id: row.try_get("updated_by_id").map_err(decode)?,
        updated_date_time: decode_optional_timestamp(
            "updated_date_time",
            row.try_get("updated_date_time").map_err(decode)?,
        )?,
    })
}

/// Appends one `SELECT ... UNION ALL SELECT ...` branch per kind the query covers.
fn push_pending_union(
    query: &mut QueryBuilder<'static, Sqlite>,
    pending: &PendingApprovalQuery,
    kinds: &[ApprovalKind],
) {
    for (index, kind) in kinds.iter().enumerate() {
        if index > 0 {
            query.push(" UNION ALL ");
        }
        query.push(format!(
            "SELECT '{kind_name}' AS kind, '{form}' AS form_name, a.{column} AS entity_id,
                    a.approver_id, d.series AS document_series,
                    d.created_date_time AS document_created_date_time,
                    a.created_date_time AS assigned_date_time, a.approved_yn
             FROM {approvals} a
             JOIN {documents} d ON d.{column} = a.{column}
             WHERE {active_approval} AND {active_document} AND a.approved_yn IS NULL
               AND a.approver_id = ",
            kind_name = kind.as_str(),
            form = kind.form_name(),
            column = kind.entity_column(),
            approvals = kind.approval_table(),
            documents = kind.document_table(),
            active_approval = active_on("a"),
            active_document = active_on("d"),
        ));
        query.push_bind(pending.user_id);
        if let Some(from) = pending.from_date {
            query.push(" AND substr(d.created_date_time, 1, 10) >= ");
            query.push_bind(from.format("%Y-%m-%d").to_string());
        }
        if let Some(to) = pending.to_date {
            query.push(" AND substr(d.created_date_time, 1, 10) <= ");
            query.push_bind(to.format("%Y-%m-%d").to_string());
        }
    }
}

fn row_to_pending(row: &SqliteRow) -> Result<PendingApprovalItem, RepositoryError> {
    let decode = |error: sqlx::Error| RepositoryError::Decode(error.to_string());

    let kind_raw: String = row.try_get("kind").map_err(decode)?;
    let kind = ApprovalKind::from_str(&kind_raw)
        .map_err(|_| RepositoryError::Decode(format!("unknown approval kind `{kind_raw}`")))?;
    let document_created: String = row.try_get("document_created_date_time").map_err(decode)?;
    let assigned: String = row.try_get("assigned_date_time").map_err(decode)?;

    Ok(PendingApprovalItem {
        kind,
        form_name: row.try_get("form_name").map_err(decode)?,
        entity_id: row.try_get("entity_id").map_err(decode)?,
        approver_id: row.try_get("approver_id").map_err(decode)?,
        document_series: row.try_get("document_series").map_err(decode)?,
        document_created_date_time: decode_timestamp(
            "document_created_date_time",
            &document_created,
        )?,
        assigned_date_time: decode_timestamp("assigned_date_time", &assigned)?,
        approved_yn: row.try_get("approved_yn").map_err(decode)?,
    })
}

#[async_trait]
impl PersistenceGateway for SqlGateway {
    async fn manage(&self, call: ManageCall) -> Result<GatewayReply, RepositoryError> {
        match call.action {
            ManageAction::Select => self.select(&call).await,
            ManageAction::Insert => self.insert(&call).await,
            ManageAction::Update => self.update(&call).await,
            ManageAction::Delete => self.delete(&call).await,
        }
    }

    async fn reference_exists(&self, check: &ReferenceCheck) -> Result<bool, RepositoryError> {
        let exists: i64 = match check {
            ReferenceCheck::Document { kind, id } => {
                sqlx::query_scalar(&format!(
                    "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1 AND {ACTIVE})",
                    kind.document_table(),
                    kind.entity_column()
                ))
                .bind(id)
                .fetch_one(&self.pool)
                .await?
            }
            ReferenceCheck::Person(person_id) => {
                sqlx::query_scalar(&format!(
                    "SELECT EXISTS(SELECT 1 FROM person WHERE person_id = ?1 AND {ACTIVE})"
                ))
                .bind(person_id)
                .fetch_one(&self.pool)
                .await?
            }
            ReferenceCheck::Form(form_name) => {
                sqlx::query_scalar(&format!(
                    "SELECT EXISTS(SELECT 1 FROM form WHERE form_name = ?1 AND {ACTIVE})"
                ))
                .bind(form_name.trim())
                .fetch_one(&self.pool)
                .await?
            }
            ReferenceCheck::Role(role_name) => {
                sqlx::query_scalar(&format!(
                    "SELECT EXISTS(SELECT 1 FROM role WHERE role_name = ?1 AND {ACTIVE})"
                ))
                .bind(role_name.trim())
                .fetch_one(&self.pool)
                .await?
            }
            ReferenceCheck::Approval { kind, key } => {
                sqlx::query_scalar(&format!(
                    "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1 AND approver_id = ?2 AND {ACTIVE})",
                    kind.approval_table(),
                    kind.entity_column()
                ))
                .bind(key.entity_id)
                .bind(key.approver_id)
                .fetch_one(&self.pool)
                .await?
            }
            ReferenceCheck::ApproverRole { approver_id, form_name, role_name } => {
                sqlx::query_scalar(&format!(
                    "SELECT EXISTS(
                         SELECT 1
                         FROM person p
                         JOIN role r ON r.role_id = p.role_id
                         JOIN form_role fr ON fr.role_id = r.role_id
                         JOIN form f ON f.form_id = fr.form_id
                         WHERE p.person_id = ?1 AND r.role_name = ?2 AND f.form_name = ?3
                           AND {} AND {} AND {} AND {})",
                    active_on("p"),
                    active_on("r"),
                    active_on("fr"),
                    active_on("f")
                ))
                .bind(approver_id)
                .bind(role_name.trim())
                .bind(form_name.trim())
                .fetch_one(&self.pool)
                .await?
            }
        };

        Ok(exists == 1)
    }

    async fn pending_approvals(
        &self,
        query: &PendingApprovalQuery,
    ) -> Result<PendingPage, RepositoryError> {
        let kinds: Vec<ApprovalKind> =
            ApprovalKind::ALL.into_iter().filter(|kind| query.matches_form(*kind)).collect();
        if kinds.is_empty() {
            return Ok(PendingPage::default());
        }

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM (");
        push_pending_union(&mut count, query, &kinds);
        count.push(")");

        let mut page = QueryBuilder::<Sqlite>::new("SELECT * FROM (");
        push_pending_union(&mut page, query, &kinds);
        page.push(
            ") ORDER BY assigned_date_time DESC, form_name ASC, entity_id DESC LIMIT ",
        );
        page.push_bind(i64::from(query.page.page_size()));
        page.push(" OFFSET ");
        page.push_bind(i64::try_from(query.page.offset()).unwrap_or(i64::MAX));

        let mut tx = self.pool.begin().await?;
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&mut *tx).await?;
        let rows = page.build().fetch_all(&mut *tx).await?;
        tx.commit().await?;

        let items = rows.iter().map(row_to_pending).collect::<Result<Vec<_>, _>>()?;
        let total_records = u64::try_from(total)
            .map_err(|_| RepositoryError::Decode(format!("negative row count {total}")))?;
        Ok(PendingPage { items, total_records })
    }

    async fn parcel(&self, parcel_id: i64) -> Result<Option<ParcelRecord>, RepositoryError> {
        // The parent quotation must be live too.
        let row = sqlx::query(&format!(
            "SELECT p.parcel_id, p.sales_quotation_id, p.parcel_number, p.item_quantity,
                    p.gross_weight_grams, p.notes, p.created_by_id, p.created_date_time,
                    p.updated_by_id, p.updated_date_time
             FROM sales_quotation_parcel p
             JOIN sales_quotation q ON q.sales_quotation_id = p.sales_quotation_id
             WHERE p.parcel_id = ?1 AND {} AND {}",
            active_on("p"),
            active_on("q")
        ))
        .bind(parcel_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_parcel).transpose()
    }

    async fn update_parcel(&self, change: &ParcelChange) -> Result<GatewayReply, RepositoryError> {
        let result = sqlx::query(&format!(
            "UPDATE sales_quotation_parcel
             SET item_quantity = COALESCE(?1, item_quantity),
                 gross_weight_grams = COALESCE(?2, gross_weight_grams),
                 notes = COALESCE(?3, notes),
                 updated_by_id = ?4,
                 updated_date_time = ?5
             WHERE parcel_id = ?6 AND {ACTIVE}"
        ))
        .bind(change.item_quantity)
        .bind(change.gross_weight_grams)
        .bind(change.notes.as_deref())
        .bind(change.updated_by_id)
        .bind(encode_timestamp(Utc::now()))
        .bind(change.parcel_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(GatewayReply::rejected(missing_parcel_message(change.parcel_id)));
        }
        Ok(GatewayReply::ok("Sales quotation parcel updated successfully"))
    }

    async fn delete_parcel(
        &self,
        revocation: &ParcelRevocation,
    ) -> Result<GatewayReply, RepositoryError> {
        let result = sqlx::query(&format!(
            "UPDATE sales_quotation_parcel
             SET is_deleted = 1, deleted_by_id = ?1, deleted_date_time = ?2
             WHERE parcel_id = ?3 AND {ACTIVE}"
        ))
        .bind(revocation.deleted_by_id)
        .bind(encode_timestamp(Utc::now()))
        .bind(revocation.parcel_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(GatewayReply::rejected(missing_parcel_message(revocation.parcel_id)));
        }
        Ok(GatewayReply::ok("Sales quotation parcel deleted successfully"))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use tradeflow_core::domain::approval::{
        ApprovalDecision, ApprovalFilter, ApprovalKey, ApprovalRevocation, NewApproval,
    };
    use tradeflow_core::domain::kind::ApprovalKind;
    use tradeflow_core::domain::parcel::{ParcelChange, ParcelRevocation};
    use tradeflow_core::domain::pending::PendingApprovalQuery;
    use tradeflow_core::pagination::{PageRequest, SortColumn, SortDirection, SortOrder};

    use super::{decode_timestamp, encode_timestamp, SqlGateway};
    use crate::gateway::{ManageCall, PageWindow, PersistenceGateway, ReferenceCheck};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup() -> (DbPool, SqlGateway) {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let created = encode_timestamp(Utc.with_ymd_and_hms(2026, 4, 1, 8, 0, 0).unwrap());
        sqlx::query(
            "INSERT INTO role (role_id, role_name, created_date_time) VALUES
                (1, 'Administrator', ?1), (2, 'Sales Manager', ?1)",
        )
        .bind(&created)
        .execute(&pool)
        .await
        .expect("roles");
        sqlx::query(
            "INSERT INTO person (person_id, first_name, last_name, role_id, created_date_time, is_deleted)
             VALUES (1, 'Ada', 'Admin', 1, ?1, 0), (7, 'Sam', 'Seller', 2, ?1, 0),
                    (8, 'Gone', 'Person', 2, ?1, 1)",
        )
        .bind(&created)
        .execute(&pool)
        .await
        .expect("persons");
        sqlx::query(
            "INSERT INTO form (form_id, form_name, created_date_time) VALUES (1, 'Sales RFQ', ?1)",
        )
        .bind(&created)
        .execute(&pool)
        .await
        .expect("forms");
        sqlx::query("INSERT INTO form_role (form_id, role_id, created_date_time) VALUES (1, 2, ?1)")
            .bind(&created)
            .execute(&pool)
            .await
            .expect("form roles");
        sqlx::query(
            "INSERT INTO sales_order (sales_order_id, series, created_by_id, created_date_time)
             VALUES (5, 'SO-0005', 1, ?1), (6, 'SO-0006', 1, ?1)",
        )
        .bind(&created)
        .execute(&pool)
        .await
        .expect("orders");

        (pool.clone(), SqlGateway::new(pool))
    }

    fn new_approval(entity_id: i64, approver_id: i64) -> NewApproval {
        NewApproval {
            key: ApprovalKey::new(entity_id, approver_id),
            approved_yn: None,
            approver_date_time: None,
            form_name: None,
            role_name: None,
            created_by_id: 1,
        }
    }

    #[tokio::test]
    async fn insert_then_select_round_trips_pending_decision() {
        let (_pool, gateway) = setup().await;

        let reply = gateway
            .manage(ManageCall::insert(ApprovalKind::SalesOrder, &new_approval(5, 7)))
            .await
            .expect("insert");
        assert_eq!(reply.succeeded().ok(), Some(true));

        let reply = gateway
            .manage(ManageCall::select(
                ApprovalKind::SalesOrder,
                ApprovalFilter { entity_id: Some(5), approver_id: Some(7) },
            ))
            .await
            .expect("select");
        assert_eq!(reply.records.len(), 1);
        assert_eq!(reply.records[0].approved_yn, None);
        assert_eq!(reply.records[0].created_by_id, 1);
    }

    #[tokio::test]
    async fn duplicate_active_pair_is_rejected_not_failed() {
        let (_pool, gateway) = setup().await;
        let call = ManageCall::insert(ApprovalKind::SalesOrder, &new_approval(5, 7));

        gateway.manage(call.clone()).await.expect("first insert");
        let reply = gateway.manage(call).await.expect("second insert");

        assert_eq!(reply.succeeded().ok(), Some(false));
        assert!(reply.message.contains("already exists"));
    }

    #[tokio::test]
    async fn soft_deleted_rows_disappear_and_pair_can_be_reassigned() {
        let (pool, gateway) = setup().await;
        gateway
            .manage(ManageCall::insert(ApprovalKind::SalesOrder, &new_approval(5, 7)))
            .await
            .expect("insert");

        let before = Utc::now();
        let revocation = ApprovalRevocation { key: ApprovalKey::new(5, 7), deleted_by_id: 1 };
        let reply = gateway
            .manage(ManageCall::delete(ApprovalKind::SalesOrder, &revocation))
            .await
            .expect("delete");
        assert_eq!(reply.succeeded().ok(), Some(true));

        let (deleted_by_id, deleted_at): (Option<i64>, Option<String>) = sqlx::query_as(
            "SELECT deleted_by_id, deleted_date_time FROM sales_order_approval WHERE is_deleted = 1",
        )
        .fetch_one(&pool)
        .await
        .expect("deleted row is kept, only flagged");
        assert_eq!(deleted_by_id, Some(1));
        let deleted_at = decode_timestamp(
            "deleted_date_time",
            deleted_at.as_deref().expect("deletion time"),
        )
        .expect("decode");
        assert!(deleted_at >= before - chrono::Duration::seconds(1));

        let exists = gateway
            .reference_exists(&ReferenceCheck::Approval {
                kind: ApprovalKind::SalesOrder,
                key: ApprovalKey::new(5, 7),
            })
            .await
            .expect("reference lookup");
        assert!(!exists);

        let again = gateway
            .manage(ManageCall::insert(ApprovalKind::SalesOrder, &new_approval(5, 7)))
            .await
            .expect("reassign");
        assert_eq!(again.succeeded().ok(), Some(true));
    }

    #[tokio::test]
    async fn create_keeps_decision_time_consistent_with_the_decision() {
        let (_pool, gateway) = setup().await;
        let supplied = Utc.with_ymd_and_hms(2026, 4, 3, 10, 0, 0).unwrap();

        let pending = NewApproval { approver_date_time: Some(supplied), ..new_approval(5, 7) };
        gateway
            .manage(ManageCall::insert(ApprovalKind::SalesOrder, &pending))
            .await
            .expect("pending insert");
        let approved = NewApproval { approved_yn: Some(true), ..new_approval(6, 7) };
        gateway
            .manage(ManageCall::insert(ApprovalKind::SalesOrder, &approved))
            .await
            .expect("approved insert");
        let rejected = NewApproval {
            approved_yn: Some(false),
            approver_date_time: Some(supplied),
            ..new_approval(6, 1)
        };
        gateway
            .manage(ManageCall::insert(ApprovalKind::SalesOrder, &rejected))
            .await
            .expect("rejected insert");

        let rows = gateway
            .manage(ManageCall::select(ApprovalKind::SalesOrder, ApprovalFilter::default()))
            .await
            .expect("select");
        let row = |entity_id: i64, approver_id: i64| {
            rows.records
                .iter()
                .find(|r| r.entity_id == entity_id && r.approver_id == approver_id)
                .expect("row")
        };

        assert_eq!(row(5, 7).approver_date_time, None);
        let stamped = row(6, 7).approver_date_time.expect("stamped at creation");
        assert_eq!(stamped, row(6, 7).created_date_time);
        assert_eq!(row(6, 1).approver_date_time, Some(supplied));
    }

    #[tokio::test]
    async fn update_stamps_decision_time_and_reports_missing_rows() {
        let (_pool, gateway) = setup().await;
        gateway
            .manage(ManageCall::insert(ApprovalKind::SalesOrder, &new_approval(5, 7)))
            .await
            .expect("insert");

        let decision = ApprovalDecision {
            key: ApprovalKey::new(5, 7),
            approved_yn: Some(true),
            approver_date_time: None,
            form_name: None,
            role_name: None,
            updated_by_id: 7,
        };
        let reply = gateway
            .manage(ManageCall::update(ApprovalKind::SalesOrder, &decision))
            .await
            .expect("update");
        assert_eq!(reply.succeeded().ok(), Some(true));

        let rows = gateway
            .manage(ManageCall::select(ApprovalKind::SalesOrder, ApprovalFilter::default()))
            .await
            .expect("select");
        assert_eq!(rows.records[0].approved_yn, Some(true));
        assert!(rows.records[0].approver_date_time.is_some());
        assert_eq!(rows.records[0].updated_by_id, Some(7));

        let missing = ApprovalDecision { key: ApprovalKey::new(6, 7), ..decision };
        let reply = gateway
            .manage(ManageCall::update(ApprovalKind::SalesOrder, &missing))
            .await
            .expect("update missing");
        assert_eq!(reply.succeeded().ok(), Some(false));
    }

    #[tokio::test]
    async fn paginated_select_reports_total_and_orders_stably() {
        let (_pool, gateway) = setup().await;
        for approver_id in [7, 1] {
            for entity_id in [5, 6] {
                gateway
                    .manage(ManageCall::insert(
                        ApprovalKind::SalesOrder,
                        &new_approval(entity_id, approver_id),
                    ))
                    .await
                    .expect("insert");
            }
        }

        let window = PageWindow {
            page: PageRequest::new(1, 3).expect("page"),
            sort: SortOrder { column: SortColumn::ApproverId, direction: SortDirection::Desc },
        };
        let reply = gateway
            .manage(ManageCall::select_page(ApprovalKind::SalesOrder, ApprovalFilter::default(), window))
            .await
            .expect("select page");

        assert_eq!(reply.total_records, Some(4));
        let keys: Vec<_> = reply.records.iter().map(|r| (r.approver_id, r.entity_id)).collect();
        assert_eq!(keys, vec![(7, 5), (7, 6), (1, 5)]);
    }

    #[tokio::test]
    async fn reference_checks_respect_soft_delete_and_role_bindings() {
        let (_pool, gateway) = setup().await;

        assert!(gateway.reference_exists(&ReferenceCheck::Person(7)).await.expect("reference lookup"));
        assert!(!gateway.reference_exists(&ReferenceCheck::Person(8)).await.expect("reference lookup"));
        assert!(gateway
            .reference_exists(&ReferenceCheck::Document { kind: ApprovalKind::SalesOrder, id: 5 })
            .await
            .expect("reference lookup"));
        assert!(!gateway
            .reference_exists(&ReferenceCheck::Document { kind: ApprovalKind::SalesOrder, id: 42 })
            .await
            .expect("reference lookup"));
        assert!(gateway
            .reference_exists(&ReferenceCheck::Form("sales rfq".to_string()))
            .await
            .expect("reference lookup"));
        assert!(gateway
            .reference_exists(&ReferenceCheck::ApproverRole {
                approver_id: 7,
                form_name: "Sales RFQ".to_string(),
                role_name: "Sales Manager".to_string(),
            })
            .await
            .expect("reference lookup"));
        assert!(!gateway
            .reference_exists(&ReferenceCheck::ApproverRole {
                approver_id: 1,
                form_name: "Sales RFQ".to_string(),
                role_name: "Sales Manager".to_string(),
            })
            .await
            .expect("reference lookup"));
    }

    #[tokio::test]
    async fn parcel_changes_apply_to_active_rows_only() {
        let (pool, gateway) = setup().await;
        let created = encode_timestamp(Utc.with_ymd_and_hms(2026, 4, 2, 8, 0, 0).unwrap());
        sqlx::query(
            "INSERT INTO sales_quotation (sales_quotation_id, series, created_by_id, created_date_time)
             VALUES (9, 'SQ-0009', 1, ?1)",
        )
        .bind(&created)
        .execute(&pool)
        .await
        .expect("quotation");
        sqlx::query(
            "INSERT INTO sales_quotation_parcel
                 (parcel_id, sales_quotation_id, parcel_number, item_quantity, gross_weight_grams,
                  created_by_id, created_date_time)
             VALUES (1, 9, 1, 10, 2500, 1, ?1)",
        )
        .bind(&created)
        .execute(&pool)
        .await
        .expect("parcel");

        let change = ParcelChange {
            parcel_id: 1,
            item_quantity: Some(12),
            gross_weight_grams: None,
            notes: Some("Crated".to_string()),
            updated_by_id: 7,
        };
        let reply = gateway.update_parcel(&change).await.expect("update");
        assert_eq!(reply.succeeded().ok(), Some(true));

        let parcel = gateway.parcel(1).await.expect("read").expect("active parcel");
        assert_eq!(parcel.item_quantity, 12);
        assert_eq!(parcel.gross_weight_grams, Some(2500));
        assert_eq!(parcel.notes.as_deref(), Some("Crated"));
        assert_eq!(parcel.updated_by_id, Some(7));

        let reply = gateway
            .delete_parcel(&ParcelRevocation { parcel_id: 1, deleted_by_id: 1 })
            .await
            .expect("delete");
        assert_eq!(reply.succeeded().ok(), Some(true));
        let deleted_by_id: Option<i64> =
            sqlx::query_scalar("SELECT deleted_by_id FROM sales_quotation_parcel WHERE parcel_id = 1")
                .fetch_one(&pool)
                .await
                .expect("kept row");
        assert_eq!(deleted_by_id, Some(1));

        assert!(gateway.parcel(1).await.expect("read").is_none());
        let again = gateway.update_parcel(&change).await.expect("update deleted");
        assert_eq!(again.succeeded().ok(), Some(false));
        assert!(again.message.contains("ParcelID 1"));
    }

    #[tokio::test]
    async fn pending_union_filters_decided_rows_and_dates() {
        let (pool, gateway) = setup().await;
        let created = encode_timestamp(Utc.with_ymd_and_hms(2026, 4, 2, 8, 0, 0).unwrap());
        sqlx::query(
            "INSERT INTO purchase_order (po_id, series, created_by_id, created_date_time)
             VALUES (11, 'PO-0011', 1, ?1)",
        )
        .bind(&created)
        .execute(&pool)
        .await
        .expect("po");

        for (kind, entity_id) in
            [(ApprovalKind::SalesOrder, 5), (ApprovalKind::SalesOrder, 6), (ApprovalKind::PurchaseOrder, 11)]
        {
            gateway.manage(ManageCall::insert(kind, &new_approval(entity_id, 7))).await.expect("insert");
        }
        let decided = ApprovalDecision {
            key: ApprovalKey::new(6, 7),
            approved_yn: Some(false),
            approver_date_time: None,
            form_name: None,
            role_name: None,
            updated_by_id: 7,
        };
        gateway.manage(ManageCall::update(ApprovalKind::SalesOrder, &decided)).await.expect("decide");

        let query = PendingApprovalQuery::new(7, None, None, None, PageRequest::default()).expect("query");
        let page = gateway.pending_approvals(&query).await.expect("pending");
        assert_eq!(page.total_records, 2);
        assert!(page.items.iter().all(|item| item.approved_yn.is_none()));

        let since = NaiveDate::from_ymd_opt(2026, 4, 2).expect("date");
        let query =
            PendingApprovalQuery::new(7, Some(since), Some(since), None, PageRequest::default())
                .expect("query");
        let page = gateway.pending_approvals(&query).await.expect("pending");
        assert_eq!(page.total_records, 1);
        assert_eq!(page.items[0].kind, ApprovalKind::PurchaseOrder);
        assert_eq!(page.items[0].document_series, "PO-0011");

        let query = PendingApprovalQuery::new(
            7,
            None,
            None,
            Some("Unknown Form".to_string()),
            PageRequest::default(),
        )
        .expect("query");
        assert_eq!(gateway.pending_approvals(&query).await.expect("pending").total_records, 0);
    }
}
