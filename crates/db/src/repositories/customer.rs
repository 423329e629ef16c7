use sqlx::Row;

use fieldops_core::domain::customer::{Customer, CustomerId};

use super::{decode_error, encode_timestamp, parse_timestamp, CustomerRepository, RepositoryError};
use crate::DbPool;

const CUSTOMER_COLUMNS: &str = "id, name, address, email, phone, billing_customer_id,
     is_placeholder, created_by, created_at, updated_at";

pub struct SqlCustomerRepository {
    pool: DbPool,
}

impl SqlCustomerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn find_placeholder(&self, email: Option<&str>) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer
             WHERE is_placeholder = 1 OR (email IS NOT NULL AND email = ?)
             ORDER BY is_placeholder DESC, created_at ASC
             LIMIT 1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_customer).transpose()
    }
}

fn row_to_customer(row: &sqlx::sqlite::SqliteRow) -> Result<Customer, RepositoryError> {
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_error)?;
    let is_placeholder: i64 = row.try_get("is_placeholder").map_err(decode_error)?;

    Ok(Customer {
        id: CustomerId(row.try_get("id").map_err(decode_error)?),
        name: row.try_get("name").map_err(decode_error)?,
        address: row.try_get("address").map_err(decode_error)?,
        email: row.try_get("email").map_err(decode_error)?,
        phone: row.try_get("phone").map_err(decode_error)?,
        billing_customer_id: row.try_get("billing_customer_id").map_err(decode_error)?,
        is_placeholder: is_placeholder != 0,
        created_by: row.try_get("created_by").map_err(decode_error)?,
        created_at: parse_timestamp("customer.created_at", &created_at)?,
        updated_at: parse_timestamp("customer.updated_at", &updated_at)?,
    })
}

#[async_trait::async_trait]
impl CustomerRepository for SqlCustomerRepository {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {CUSTOMER_COLUMNS} FROM customer WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_customer).transpose()
    }

    async fn save(&self, customer: Customer) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO customer (id, name, address, email, phone, billing_customer_id,
                                   is_placeholder, created_by, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 address = excluded.address,
                 email = excluded.email,
                 phone = excluded.phone,
                 billing_customer_id = excluded.billing_customer_id,
                 updated_at = excluded.updated_at",
        )
        .bind(&customer.id.0)
        .bind(&customer.name)
        .bind(&customer.address)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.billing_customer_id)
        .bind(i64::from(customer.is_placeholder))
        .bind(&customer.created_by)
        .bind(encode_timestamp(customer.created_at))
        .bind(encode_timestamp(customer.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_with_address(&self) -> Result<Vec<Customer>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer
             WHERE is_placeholder = 0 AND address IS NOT NULL AND TRIM(address) <> ''
             ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_customer).collect()
    }

    async fn get_or_create_placeholder(
        &self,
        candidate: Customer,
    ) -> Result<Customer, RepositoryError> {
        if let Some(existing) = self.find_placeholder(candidate.email.as_deref()).await? {
            return Ok(existing);
        }

        // the partial unique index turns a concurrent second insert into a no-op
        sqlx::query(
            "INSERT OR IGNORE INTO customer (id, name, address, email, phone, billing_customer_id,
                                             is_placeholder, created_by, created_at, updated_at)
             VALUES (?, ?, NULL, ?, NULL, NULL, 1, ?, ?, ?)",
        )
        .bind(&candidate.id.0)
        .bind(&candidate.name)
        .bind(&candidate.email)
        .bind(&candidate.created_by)
        .bind(encode_timestamp(candidate.created_at))
        .bind(encode_timestamp(candidate.updated_at))
        .execute(&self.pool)
        .await?;

        self.find_placeholder(candidate.email.as_deref())
            .await?
            .ok_or_else(|| RepositoryError::NotFound("placeholder customer".to_string()))
    }

    async fn first_created_by(&self) -> Result<Option<String>, RepositoryError> {
        let row = sqlx::query(
            "SELECT created_by FROM customer
             WHERE is_placeholder = 0
             ORDER BY created_at ASC
             LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| row.try_get::<String, _>("created_by").map_err(decode_error)).transpose()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use fieldops_core::domain::customer::{Customer, CustomerId};

    use super::SqlCustomerRepository;
    use crate::repositories::CustomerRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn customer(id: &str, address: Option<&str>, age_days: i64) -> Customer {
        let created = Utc::now() - Duration::days(age_days);
        Customer {
            id: CustomerId(id.to_string()),
            name: format!("Customer {id}"),
            address: address.map(str::to_string),
            email: Some(format!("{id}@example.com")),
            phone: None,
            billing_customer_id: None,
            is_placeholder: false,
            created_by: format!("user-{id}"),
            created_at: created,
            updated_at: created,
        }
    }

    #[tokio::test]
    async fn save_and_find_by_id() {
        let repo = SqlCustomerRepository::new(setup().await);
        let original = customer("C-1", Some("500 Oak Ave"), 0);

        repo.save(original.clone()).await.expect("save");
        let found = repo.find_by_id(&original.id).await.expect("find").expect("exists");

        assert_eq!(found.name, original.name);
        assert_eq!(found.address, original.address);
        assert_eq!(found.created_at.timestamp_micros(), original.created_at.timestamp_micros());
        assert!(!found.is_placeholder);
    }

    #[tokio::test]
    async fn save_upserts_billing_customer_id() {
        let repo = SqlCustomerRepository::new(setup().await);
        let mut record = customer("C-1", Some("500 Oak Ave"), 0);
        repo.save(record.clone()).await.expect("save");

        record.billing_customer_id = Some("BILL-77".to_string());
        repo.save(record.clone()).await.expect("upsert");

        let found = repo.find_by_id(&record.id).await.expect("find").expect("exists");
        assert_eq!(found.billing_customer_id.as_deref(), Some("BILL-77"));
    }

    #[tokio::test]
    async fn list_with_address_skips_blank_and_placeholder_rows() {
        let repo = SqlCustomerRepository::new(setup().await);
        repo.save(customer("C-1", Some("500 Oak Ave"), 2)).await.expect("save 1");
        repo.save(customer("C-2", None, 1)).await.expect("save 2");
        repo.save(customer("C-3", Some("   "), 1)).await.expect("save 3");
        repo.save(customer("C-4", Some("10 Elm Dr"), 0)).await.expect("save 4");

        let listed = repo.list_with_address().await.expect("list");
        let ids: Vec<&str> = listed.iter().map(|entry| entry.id.0.as_str()).collect();

        assert_eq!(ids, vec!["C-1", "C-4"]);
    }

    #[tokio::test]
    async fn placeholder_is_created_once_and_reused() {
        let repo = SqlCustomerRepository::new(setup().await);
        let now = Utc::now();

        let first = repo
            .get_or_create_placeholder(Customer::placeholder(
                "N/A",
                "placeholder@fieldops.invalid",
                "system",
                now,
            ))
            .await
            .expect("first placeholder");
        let second = repo
            .get_or_create_placeholder(Customer::placeholder(
                "N/A",
                "placeholder@fieldops.invalid",
                "system",
                now,
            ))
            .await
            .expect("second placeholder");

        assert_eq!(first.id, second.id);
        assert!(first.is_placeholder);

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM customer WHERE is_placeholder = 1")
                .fetch_one(&repo.pool)
                .await
                .expect("count");
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn second_placeholder_row_is_rejected_by_index() {
        let repo = SqlCustomerRepository::new(setup().await);
        let now = Utc::now();
        repo.save(Customer::placeholder("N/A", "a@fieldops.invalid", "system", now))
            .await
            .expect("first placeholder");

        let duplicate = repo.save(Customer::placeholder("N/A", "b@fieldops.invalid", "system", now)).await;
        assert!(duplicate.is_err(), "a second placeholder row must violate the unique index");
    }

    #[tokio::test]
    async fn first_created_by_ignores_placeholder() {
        let repo = SqlCustomerRepository::new(setup().await);
        assert_eq!(repo.first_created_by().await.expect("empty"), None);

        repo.save(Customer::placeholder(
            "N/A",
            "placeholder@fieldops.invalid",
            "system",
            Utc::now() - Duration::days(30),
        ))
        .await
        .expect("placeholder");
        repo.save(customer("C-2", None, 1)).await.expect("newer");
        repo.save(customer("C-1", None, 5)).await.expect("older");

        assert_eq!(repo.first_created_by().await.expect("lookup").as_deref(), Some("user-C-1"));
    }
}
