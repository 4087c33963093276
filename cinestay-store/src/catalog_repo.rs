use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use cinestay_core::catalog::{Branch, ComboPackage, MenuCategory, MenuItem, Room, RoomType};
use cinestay_core::repository::{ComboRepository, MenuRepository, RoomRepository, StoreResult};

/// Postgres repository for the catalog tables (combos, menu, branches, rooms, room types).
pub struct StoreCatalogRepository {
    pool: PgPool,
}

impl StoreCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ComboRow {
    id: Uuid,
    name: String,
    code: String,
    description: Option<String>,
    duration_minutes: i32,
    price: i64,
    display_order: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ComboRow> for ComboPackage {
    fn from(row: ComboRow) -> Self {
        ComboPackage {
            id: row.id,
            name: row.name,
            code: row.code,
            description: row.description,
            duration_minutes: row.duration_minutes,
            price: row.price,
            display_order: row.display_order,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct MenuItemRow {
    id: Uuid,
    name: String,
    category: String,
    price: i64,
    description: Option<String>,
    is_available: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MenuItemRow> for MenuItem {
    type Error = cinestay_core::CoreError;

    fn try_from(row: MenuItemRow) -> Result<Self, Self::Error> {
        Ok(MenuItem {
            id: row.id,
            name: row.name,
            category: row.category.parse()?,
            price: row.price,
            description: row.description,
            is_available: row.is_available,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BranchRow {
    id: Uuid,
    name: String,
    address: String,
    is_active: bool,
}

#[derive(sqlx::FromRow)]
struct RoomRow {
    id: Uuid,
    branch_id: Uuid,
    room_type_id: Uuid,
    name: String,
    lock_id: Option<String>,
    is_active: bool,
}

#[derive(sqlx::FromRow)]
struct RoomTypeRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    capacity: i32,
    price_per_hour: i64,
    amenities: Vec<String>,
    is_active: bool,
}

impl From<BranchRow> for Branch {
    fn from(row: BranchRow) -> Self {
        Branch { id: row.id, name: row.name, address: row.address, is_active: row.is_active }
    }
}

impl From<RoomRow> for Room {
    fn from(row: RoomRow) -> Self {
        Room {
            id: row.id,
            branch_id: row.branch_id,
            room_type_id: row.room_type_id,
            name: row.name,
            lock_id: row.lock_id,
            is_active: row.is_active,
        }
    }
}

impl From<RoomTypeRow> for RoomType {
    fn from(row: RoomTypeRow) -> Self {
        RoomType {
            id: row.id,
            name: row.name,
            description: row.description,
            capacity: row.capacity,
            price_per_hour: row.price_per_hour,
            amenities: row.amenities,
            is_active: row.is_active,
        }
    }
}

const COMBO_COLUMNS: &str =
    "id, name, code, description, duration_minutes, price, display_order, is_active, created_at, updated_at";
const MENU_COLUMNS: &str = "id, name, category, price, description, is_available, created_at, updated_at";

#[async_trait]
impl ComboRepository for StoreCatalogRepository {
    async fn list_combos(&self, active_only: bool) -> StoreResult<Vec<ComboPackage>> {
        let rows = sqlx::query_as::<_, ComboRow>(&format!(
            "SELECT {} FROM combo_packages WHERE ($1 = FALSE OR is_active) ORDER BY display_order, name",
            COMBO_COLUMNS
        ))
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ComboPackage::from).collect())
    }

    async fn get_combo(&self, id: Uuid) -> StoreResult<Option<ComboPackage>> {
        let row = sqlx::query_as::<_, ComboRow>(&format!("SELECT {} FROM combo_packages WHERE id = $1", COMBO_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ComboPackage::from))
    }

    async fn find_combo_by_code(&self, code: &str) -> StoreResult<Option<ComboPackage>> {
        let row = sqlx::query_as::<_, ComboRow>(&format!(
            "SELECT {} FROM combo_packages WHERE UPPER(code) = UPPER($1)",
            COMBO_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ComboPackage::from))
    }

    async fn insert_combo(&self, combo: &ComboPackage) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO combo_packages (id, name, code, description, duration_minutes, price, display_order, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(combo.id)
        .bind(&combo.name)
        .bind(&combo.code)
        .bind(&combo.description)
        .bind(combo.duration_minutes)
        .bind(combo.price)
        .bind(combo.display_order)
        .bind(combo.is_active)
        .bind(combo.created_at)
        .bind(combo.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_combo(&self, combo: &ComboPackage) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE combo_packages
            SET name = $2, code = $3, description = $4, duration_minutes = $5, price = $6,
                display_order = $7, is_active = $8, updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(combo.id)
        .bind(&combo.name)
        .bind(&combo.code)
        .bind(&combo.description)
        .bind(combo.duration_minutes)
        .bind(combo.price)
        .bind(combo.display_order)
        .bind(combo.is_active)
        .bind(combo.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_combo(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM combo_packages WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl MenuRepository for StoreCatalogRepository {
    async fn list_menu_items(
        &self,
        category: Option<MenuCategory>,
        available_only: bool,
    ) -> StoreResult<Vec<MenuItem>> {
        let rows = sqlx::query_as::<_, MenuItemRow>(&format!(
            "SELECT {} FROM menu_items WHERE ($1::TEXT IS NULL OR category = $1) AND ($2 = FALSE OR is_available) ORDER BY category, name",
            MENU_COLUMNS
        ))
        .bind(category.map(|c| c.as_str()))
        .bind(available_only)
        .fetch_all(&self.pool)
        .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(MenuItem::try_from(row)?);
        }
        Ok(items)
    }

    async fn get_menu_item(&self, id: Uuid) -> StoreResult<Option<MenuItem>> {
        let row = sqlx::query_as::<_, MenuItemRow>(&format!("SELECT {} FROM menu_items WHERE id = $1", MENU_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(MenuItem::try_from(row)?)),
            None => Ok(None),
        }
    }

    async fn insert_menu_item(&self, item: &MenuItem) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO menu_items (id, name, category, price, description, is_available, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(item.id)
        .bind(&item.name)
        .bind(item.category.as_str())
        .bind(item.price)
        .bind(&item.description)
        .bind(item.is_available)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_menu_item(&self, item: &MenuItem) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE menu_items
            SET name = $2, category = $3, price = $4, description = $5, is_available = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(item.id)
        .bind(&item.name)
        .bind(item.category.as_str())
        .bind(item.price)
        .bind(&item.description)
        .bind(item.is_available)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_menu_item(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM menu_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl RoomRepository for StoreCatalogRepository {
    async fn list_branches(&self, active_only: bool) -> StoreResult<Vec<Branch>> {
        let rows = sqlx::query_as::<_, BranchRow>(
            "SELECT id, name, address, is_active FROM branches WHERE ($1 = FALSE OR is_active) ORDER BY name",
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Branch::from).collect())
    }

    async fn get_branch(&self, id: Uuid) -> StoreResult<Option<Branch>> {
        let row = sqlx::query_as::<_, BranchRow>("SELECT id, name, address, is_active FROM branches WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Branch::from))
    }

    async fn insert_branch(&self, branch: &Branch) -> StoreResult<()> {
        sqlx::query("INSERT INTO branches (id, name, address, is_active) VALUES ($1, $2, $3, $4)")
            .bind(branch.id)
            .bind(&branch.name)
            .bind(&branch.address)
            .bind(branch.is_active)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_rooms(&self, branch_id: Option<Uuid>, active_only: bool) -> StoreResult<Vec<Room>> {
        let rows = sqlx::query_as::<_, RoomRow>(
            r#"
            SELECT id, branch_id, room_type_id, name, lock_id, is_active FROM rooms
            WHERE ($1::UUID IS NULL OR branch_id = $1) AND ($2 = FALSE OR is_active)
            ORDER BY name
            "#,
        )
        .bind(branch_id)
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Room::from).collect())
    }

    async fn get_room(&self, id: Uuid) -> StoreResult<Option<Room>> {
        let row = sqlx::query_as::<_, RoomRow>(
            "SELECT id, branch_id, room_type_id, name, lock_id, is_active FROM rooms WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Room::from))
    }

    async fn insert_room(&self, room: &Room) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO rooms (id, branch_id, room_type_id, name, lock_id, is_active) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(room.id)
        .bind(room.branch_id)
        .bind(room.room_type_id)
        .bind(&room.name)
        .bind(&room.lock_id)
        .bind(room.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_room_types(&self, active_only: bool) -> StoreResult<Vec<RoomType>> {
        let rows = sqlx::query_as::<_, RoomTypeRow>(
            r#"
            SELECT id, name, description, capacity, price_per_hour, amenities, is_active FROM room_types
            WHERE ($1 = FALSE OR is_active)
            ORDER BY price_per_hour, name
            "#,
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(RoomType::from).collect())
    }

    async fn get_room_type(&self, id: Uuid) -> StoreResult<Option<RoomType>> {
        let row = sqlx::query_as::<_, RoomTypeRow>(
            "SELECT id, name, description, capacity, price_per_hour, amenities, is_active FROM room_types WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(RoomType::from))
    }

    async fn insert_room_type(&self, room_type: &RoomType) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO room_types (id, name, description, capacity, price_per_hour, amenities, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(room_type.id)
        .bind(&room_type.name)
        .bind(&room_type.description)
        .bind(room_type.capacity)
        .bind(room_type.price_per_hour)
        .bind(&room_type.amenities)
        .bind(room_type.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_room_type(&self, room_type: &RoomType) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE room_types
            SET name = $2, description = $3, capacity = $4, price_per_hour = $5, amenities = $6, is_active = $7
            WHERE id = $1
            "#,
        )
        .bind(room_type.id)
        .bind(&room_type.name)
        .bind(&room_type.description)
        .bind(room_type.capacity)
        .bind(room_type.price_per_hour)
        .bind(&room_type.amenities)
        .bind(room_type.is_active)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
