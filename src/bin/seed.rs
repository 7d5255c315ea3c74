use petsupply_store::{
    config::AppConfig,
    db::{DbPool, create_orm_conn, run_migrations},
    rbac::keys,
    services::auth_service::hash_password,
    validation::slugify,
};
use uuid::Uuid;

const STAFF_PERMISSIONS: &[&str] = &[
    keys::PRODUCT_CREATE,
    keys::PRODUCT_UPDATE,
    keys::CATEGORY_CREATE,
    keys::CATEGORY_UPDATE,
    keys::ORDER_READ,
    keys::ORDER_UPDATE,
    keys::METRICS_READ,
    keys::UPLOAD_CREATE,
];

const CATEGORIES: &[(&str, &str)] = &[
    ("Dog Food", "Dry and wet food for dogs of every size"),
    ("Cat Toys", "Wands, balls and scratchers"),
    ("Aquarium", "Tanks, filters and water care"),
];

// (name, category, price in cents, stock)
const PRODUCTS: &[(&str, &str, i64, i32)] = &[
    ("Grain-Free Kibble 5kg", "Dog Food", 4599, 40),
    ("Salmon Pate 12-Pack", "Dog Food", 2199, 60),
    ("Feather Wand", "Cat Toys", 899, 120),
    ("Catnip Mouse Trio", "Cat Toys", 649, 200),
    ("Nano Filter 20L", "Aquarium", 3450, 25),
    ("Water Conditioner 250ml", "Aquarium", 1199, 80),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;
    let pool = orm.get_postgres_connection_pool().clone();

    seed_permissions(&pool).await?;
    let admin_role = ensure_role(&pool, "admin", "Full access", &[keys::ADMIN_ACCESS]).await?;
    let staff_role = ensure_role(&pool, "staff", "Catalog and order management", STAFF_PERMISSIONS).await?;
    let customer_role = ensure_role(&pool, "customer", "Storefront shopper", &[]).await?;

    let admin_email =
        std::env::var("SEED_ADMIN_EMAIL").unwrap_or_else(|_| "admin@petsupply.local".to_string());
    let admin_password =
        std::env::var("SEED_ADMIN_PASSWORD").unwrap_or_else(|_| "admin12345".to_string());
    let admin_id = ensure_user(&pool, &admin_email, &admin_password, "admin", admin_role).await?;
    let staff_id = ensure_user(&pool, "staff@petsupply.local", "staff12345", "staff", staff_role).await?;
    let customer_id =
        ensure_user(&pool, "customer@petsupply.local", "customer12345", "customer", customer_role)
            .await?;

    seed_catalog(&pool).await?;

    println!("Seed completed. Admin: {admin_id}, staff: {staff_id}, customer: {customer_id}");
    Ok(())
}

async fn seed_permissions(pool: &DbPool) -> anyhow::Result<()> {
    for &(key, description) in keys::ALL {
        sqlx::query(
            r#"
            INSERT INTO permissions (id, key, description)
            VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE SET description = EXCLUDED.description
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(key)
        .bind(description)
        .execute(pool)
        .await?;
    }
    println!("Ensured {} permissions", keys::ALL.len());
    Ok(())
}

async fn ensure_role(
    pool: &DbPool,
    name: &str,
    description: &str,
    permission_keys: &[&str],
) -> anyhow::Result<Uuid> {
    let (role_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO roles (id, name, description)
        VALUES ($1, $2, $3)
        ON CONFLICT (name) DO UPDATE SET description = EXCLUDED.description
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(description)
    .fetch_one(pool)
    .await?;

    let keys: Vec<String> = permission_keys.iter().map(|k| k.to_string()).collect();
    sqlx::query(
        r#"
        INSERT INTO role_permissions (role_id, permission_id)
        SELECT $1, id FROM permissions WHERE key = ANY($2)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(role_id)
    .bind(&keys)
    .execute(pool)
    .await?;

    println!("Ensured role {name} ({} permissions)", keys.len());
    Ok(role_id)
}

async fn ensure_user(
    pool: &DbPool,
    email: &str,
    password: &str,
    legacy_role: &str,
    role_id: Uuid,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password)?;

    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, role)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(legacy_role)
    .fetch_one(pool)
    .await?;

    sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
        .bind(user_id)
        .bind(role_id)
        .execute(pool)
        .await?;

    println!("Ensured user {email} (role={legacy_role})");
    Ok(user_id)
}

async fn seed_catalog(pool: &DbPool) -> anyhow::Result<()> {
    for &(name, description) in CATEGORIES {
        sqlx::query(
            r#"
            INSERT INTO categories (id, name, slug, description)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (slug) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(slugify(name))
        .bind(description)
        .execute(pool)
        .await?;
    }

    for &(name, category, price, stock) in PRODUCTS {
        sqlx::query(
            r#"
            INSERT INTO products (id, category_id, name, slug, price, stock)
            SELECT $1, c.id, $2, $3, $4, $5 FROM categories c WHERE c.slug = $6
            ON CONFLICT (slug) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(slugify(name))
        .bind(price)
        .bind(stock)
        .bind(slugify(category))
        .execute(pool)
        .await?;
    }

    println!(
        "Ensured {} categories and {} products",
        CATEGORIES.len(),
        PRODUCTS.len()
    );
    Ok(())
}
