//! Inventory store: pre-provisioned credential records tagged by plan.
//!
//! Items are created by restock, consumed exactly once by the allocation
//! engine, and never deleted. `reserve_one` is the only operation that
//! flips a row to SOLD, and it does so as one conditional UPDATE so two
//! concurrent approvals can never claim the same row.

use rusqlite::{params, Connection, OptionalExtension};

use crate::core::error::AppResult;

pub type ItemId = i64;

/// Inventory item status. SOLD is terminal; a manual restock creates new
/// rows instead of reviving old ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Available,
    Sold,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Available => "available",
            ItemStatus::Sold => "sold",
        }
    }

    pub fn parse(s: &str) -> Option<ItemStatus> {
        match s {
            "available" => Some(ItemStatus::Available),
            "sold" => Some(ItemStatus::Sold),
            _ => None,
        }
    }
}

/// An inventory row from the database.
#[derive(Debug, Clone)]
pub struct InventoryItem {
    pub id: ItemId,
    pub plan: String,
    pub secret_payload: String,
    pub status: ItemStatus,
    pub created_at: String,
    pub sold_at: Option<String>,
}

/// Per-plan stock breakdown for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStock {
    pub plan: String,
    pub available: i64,
    pub sold: i64,
}

fn parse_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<InventoryItem> {
    let status_str: String = row.get(3)?;
    let status = ItemStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown item status '{}'", status_str).into(),
        )
    })?;
    Ok(InventoryItem {
        id: row.get(0)?,
        plan: row.get(1)?,
        secret_payload: row.get(2)?,
        status,
        created_at: row.get(4)?,
        sold_at: row.get(5)?,
    })
}

/// Number of AVAILABLE items of a plan. Side-effect free.
pub fn count_available(conn: &Connection, plan: &str) -> AppResult<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM inventory WHERE plan = ?1 AND status = 'available'",
        params![plan],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Number of SOLD items of a plan.
pub fn count_sold(conn: &Connection, plan: &str) -> AppResult<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM inventory WHERE plan = ?1 AND status = 'sold'",
        params![plan],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Insert a new AVAILABLE item and return its id.
///
/// Duplicate payloads are accepted; deduplication is the restocker's
/// responsibility.
pub fn restock(conn: &Connection, plan: &str, secret_payload: &str) -> AppResult<ItemId> {
    conn.execute(
        "INSERT INTO inventory (plan, secret_payload, status) VALUES (?1, ?2, 'available')",
        params![plan, secret_payload],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Get an item by id.
pub fn get_item(conn: &Connection, id: ItemId) -> AppResult<Option<InventoryItem>> {
    let item = conn
        .query_row(
            "SELECT id, plan, secret_payload, status, created_at, sold_at
             FROM inventory WHERE id = ?1",
            params![id],
            parse_row,
        )
        .optional()?;
    Ok(item)
}

/// Claim one AVAILABLE item of a plan and flip it to SOLD, oldest first.
///
/// The check and the flip are one conditional UPDATE: concurrent callers
/// observe a non-overlapping partition of the pool, each getting either a
/// distinct row or `None`. `None` means the plan is out of stock.
pub fn reserve_one(conn: &Connection, plan: &str) -> AppResult<Option<InventoryItem>> {
    let item = conn
        .query_row(
            "UPDATE inventory
             SET status = 'sold', sold_at = datetime('now')
             WHERE id = (
                 SELECT id FROM inventory
                 WHERE plan = ?1 AND status = 'available'
                 ORDER BY id
                 LIMIT 1
             )
             RETURNING id, plan, secret_payload, status, created_at, sold_at",
            params![plan],
            parse_row,
        )
        .optional()?;
    Ok(item)
}

/// Available/sold breakdown for every plan that ever had stock.
pub fn stock_by_plan(conn: &Connection) -> AppResult<Vec<PlanStock>> {
    let mut stmt = conn.prepare(
        "SELECT plan,
                SUM(CASE WHEN status = 'available' THEN 1 ELSE 0 END),
                SUM(CASE WHEN status = 'sold' THEN 1 ELSE 0 END)
         FROM inventory
         GROUP BY plan
         ORDER BY plan",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(PlanStock {
            plan: row.get(0)?,
            available: row.get(1)?,
            sold: row.get(2)?,
        })
    })?;

    let mut stock = Vec::new();
    for row in rows {
        stock.push(row?);
    }
    Ok(stock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::init_schema;
    use rusqlite::Connection;

    fn make_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    // ── restock / counts ─────────────────────────────────────────────────────

    #[test]
    fn restock_creates_available_item() {
        let conn = make_conn();
        let id = restock(&conn, "monthly", "login:pass").unwrap();
        assert!(id > 0);

        let item = get_item(&conn, id).unwrap().unwrap();
        assert_eq!(item.plan, "monthly");
        assert_eq!(item.secret_payload, "login:pass");
        assert_eq!(item.status, ItemStatus::Available);
        assert!(item.sold_at.is_none());
    }

    #[test]
    fn restock_accepts_duplicate_payloads() {
        let conn = make_conn();
        let a = restock(&conn, "monthly", "same:pair").unwrap();
        let b = restock(&conn, "monthly", "same:pair").unwrap();
        assert_ne!(a, b, "each restock creates a distinct item");
        assert_eq!(count_available(&conn, "monthly").unwrap(), 2);
    }

    #[test]
    fn counts_are_scoped_to_plan() {
        let conn = make_conn();
        restock(&conn, "monthly", "a").unwrap();
        restock(&conn, "yearly", "b").unwrap();
        restock(&conn, "yearly", "c").unwrap();

        assert_eq!(count_available(&conn, "monthly").unwrap(), 1);
        assert_eq!(count_available(&conn, "yearly").unwrap(), 2);
        assert_eq!(count_available(&conn, "lifetime").unwrap(), 0);
    }

    // ── reserve_one ──────────────────────────────────────────────────────────

    #[test]
    fn reserve_one_takes_oldest_item_first() {
        let conn = make_conn();
        let first = restock(&conn, "monthly", "first").unwrap();
        let _second = restock(&conn, "monthly", "second").unwrap();

        let item = reserve_one(&conn, "monthly").unwrap().unwrap();
        assert_eq!(item.id, first);
        assert_eq!(item.secret_payload, "first");
        assert_eq!(item.status, ItemStatus::Sold);
        assert!(item.sold_at.is_some());
    }

    #[test]
    fn reserve_one_returns_none_when_empty() {
        let conn = make_conn();
        assert!(reserve_one(&conn, "monthly").unwrap().is_none());

        // A different plan's stock does not help
        restock(&conn, "yearly", "y").unwrap();
        assert!(reserve_one(&conn, "monthly").unwrap().is_none());
    }

    #[test]
    fn reserve_one_never_hands_out_the_same_item_twice() {
        let conn = make_conn();
        restock(&conn, "monthly", "a").unwrap();
        restock(&conn, "monthly", "b").unwrap();

        let x = reserve_one(&conn, "monthly").unwrap().unwrap();
        let y = reserve_one(&conn, "monthly").unwrap().unwrap();
        assert_ne!(x.id, y.id);
        assert!(reserve_one(&conn, "monthly").unwrap().is_none());
    }

    #[test]
    fn reservation_conserves_total_count() {
        let conn = make_conn();
        for i in 0..3 {
            restock(&conn, "yearly", &format!("acc{}", i)).unwrap();
        }
        reserve_one(&conn, "yearly").unwrap().unwrap();

        let available = count_available(&conn, "yearly").unwrap();
        let sold = count_sold(&conn, "yearly").unwrap();
        assert_eq!(available + sold, 3);
        assert_eq!(available, 2);
        assert_eq!(sold, 1);
    }

    // ── stock_by_plan ────────────────────────────────────────────────────────

    #[test]
    fn stock_by_plan_groups_and_orders() {
        let conn = make_conn();
        restock(&conn, "yearly", "y1").unwrap();
        restock(&conn, "monthly", "m1").unwrap();
        restock(&conn, "monthly", "m2").unwrap();
        reserve_one(&conn, "monthly").unwrap().unwrap();

        let stock = stock_by_plan(&conn).unwrap();
        assert_eq!(
            stock,
            vec![
                PlanStock {
                    plan: "monthly".into(),
                    available: 1,
                    sold: 1
                },
                PlanStock {
                    plan: "yearly".into(),
                    available: 1,
                    sold: 0
                },
            ]
        );
    }
}
