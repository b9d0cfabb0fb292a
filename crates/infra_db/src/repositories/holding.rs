//! Holding repository implementation
//!
//! Positions and their append-only lot log. A position update that carries a
//! lot inserts the lot in the same transaction; lots are read back in `seq`
//! order so replaying them reproduces the position.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::repositories::deposit::missing_or_stale;

/// Repository for positions and lots
#[derive(Debug, Clone)]
pub struct HoldingRepository {
    pool: PgPool,
}

impl HoldingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_position(&self, id: Uuid) -> Result<Option<PositionRow>, DatabaseError> {
        sqlx::query_as::<_, PositionRow>(
            r#"
            SELECT id, user_id, asset_class, name, symbol, quantity, unit_cost,
                   purchase_date, created_at, updated_at, version
            FROM positions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Lists a user's positions; `asset_class` of `None` matches every class
    pub async fn list_positions(
        &self,
        user_id: Uuid,
        asset_class: Option<&str>,
    ) -> Result<Vec<PositionRow>, DatabaseError> {
        sqlx::query_as::<_, PositionRow>(
            r#"
            SELECT id, user_id, asset_class, name, symbol, quantity, unit_cost,
                   purchase_date, created_at, updated_at, version
            FROM positions
            WHERE user_id = $1
              AND ($2::text IS NULL OR asset_class = $2)
            ORDER BY created_at, id
            "#,
        )
        .bind(user_id)
        .bind(asset_class)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Inserts a position together with its opening lot
    pub async fn insert_position(
        &self,
        position: &PositionRow,
        opening_lot: &LotRow,
    ) -> Result<PositionRow, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let stored = sqlx::query_as::<_, PositionRow>(
            r#"
            INSERT INTO positions (
                id, user_id, asset_class, name, symbol, quantity, unit_cost,
                purchase_date, created_at, updated_at, version
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id, user_id, asset_class, name, symbol, quantity, unit_cost,
                      purchase_date, created_at, updated_at, version
            "#,
        )
        .bind(position.id)
        .bind(position.user_id)
        .bind(&position.asset_class)
        .bind(&position.name)
        .bind(&position.symbol)
        .bind(position.quantity)
        .bind(position.unit_cost)
        .bind(position.purchase_date)
        .bind(position.created_at)
        .bind(position.updated_at)
        .bind(position.version)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        insert_lot_row(&mut tx, opening_lot).await?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok(stored)
    }

    /// Updates a position and appends the lot that produced the new state
    pub async fn commit_lot(
        &self,
        position: &PositionRow,
        lot: &LotRow,
    ) -> Result<PositionRow, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let stored = update_position_row(&mut tx, position).await?;
        insert_lot_row(&mut tx, lot).await?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok(stored)
    }

    pub async fn update_position(&self, position: &PositionRow) -> Result<PositionRow, DatabaseError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from_sqlx)?;
        update_position_row(&mut conn, position).await
    }

    /// Deletes a position; its lots go with it through the cascade
    pub async fn delete_position(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM positions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_lots(&self, position_id: Uuid) -> Result<Vec<LotRow>, DatabaseError> {
        sqlx::query_as::<_, LotRow>(
            r#"
            SELECT id, position_id, user_id, quantity, unit_cost, purchase_date, recorded_at
            FROM lots
            WHERE position_id = $1
            ORDER BY seq
            "#,
        )
        .bind(position_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn list_user_lots(
        &self,
        user_id: Uuid,
        asset_class: Option<&str>,
    ) -> Result<Vec<LotRow>, DatabaseError> {
        sqlx::query_as::<_, LotRow>(
            r#"
            SELECT l.id, l.position_id, l.user_id, l.quantity, l.unit_cost,
                   l.purchase_date, l.recorded_at
            FROM lots l
            JOIN positions p ON p.id = l.position_id
            WHERE l.user_id = $1
              AND ($2::text IS NULL OR p.asset_class = $2)
            ORDER BY l.seq
            "#,
        )
        .bind(user_id)
        .bind(asset_class)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}

async fn update_position_row(
    conn: &mut PgConnection,
    position: &PositionRow,
) -> Result<PositionRow, DatabaseError> {
    let updated = sqlx::query_as::<_, PositionRow>(
        r#"
        UPDATE positions
        SET name = $3,
            symbol = $4,
            quantity = $5,
            unit_cost = $6,
            purchase_date = $7,
            updated_at = $8,
            version = version + 1
        WHERE id = $1 AND version = $2
        RETURNING id, user_id, asset_class, name, symbol, quantity, unit_cost,
                  purchase_date, created_at, updated_at, version
        "#,
    )
    .bind(position.id)
    .bind(position.version)
    .bind(&position.name)
    .bind(&position.symbol)
    .bind(position.quantity)
    .bind(position.unit_cost)
    .bind(position.purchase_date)
    .bind(position.updated_at)
    .fetch_optional(&mut *conn)
    .await
    .map_err(DatabaseError::from_sqlx)?;

    match updated {
        Some(row) => Ok(row),
        None => Err(missing_or_stale(conn, "positions", "Position", position.id, position.version).await),
    }
}

async fn insert_lot_row(conn: &mut PgConnection, lot: &LotRow) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO lots (id, position_id, user_id, quantity, unit_cost, purchase_date, recorded_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(lot.id)
    .bind(lot.position_id)
    .bind(lot.user_id)
    .bind(lot.quantity)
    .bind(lot.unit_cost)
    .bind(lot.purchase_date)
    .bind(lot.recorded_at)
    .execute(&mut *conn)
    .await
    .map_err(DatabaseError::from_sqlx)?;
    Ok(())
}

/// Database row for a position
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct PositionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    /// `stock` or `mutual_fund`
    pub asset_class: String,
    pub name: String,
    pub symbol: Option<String>,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub purchase_date: NaiveDate,
    pub created_at: NaiveDate,
    pub updated_at: NaiveDate,
    pub version: i64,
}

/// Database row for a lot
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct LotRow {
    pub id: Uuid,
    pub position_id: Uuid,
    pub user_id: Uuid,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub purchase_date: NaiveDate,
    pub recorded_at: NaiveDate,
}
