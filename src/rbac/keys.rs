//! Permission keys known to the application. Keys are `resource:action`.

/// Super-permission: satisfies every check.
pub const ADMIN_ACCESS: &str = "admin:access";

pub const PRODUCT_CREATE: &str = "product:create";
pub const PRODUCT_UPDATE: &str = "product:update";
pub const PRODUCT_DELETE: &str = "product:delete";

pub const CATEGORY_CREATE: &str = "category:create";
pub const CATEGORY_UPDATE: &str = "category:update";
pub const CATEGORY_DELETE: &str = "category:delete";

pub const ORDER_READ: &str = "order:read";
pub const ORDER_UPDATE: &str = "order:update";

pub const USER_READ: &str = "user:read";
pub const USER_UPDATE: &str = "user:update";
pub const USER_DELETE: &str = "user:delete";

pub const ROLE_READ: &str = "role:read";
pub const ROLE_CREATE: &str = "role:create";
pub const ROLE_UPDATE: &str = "role:update";
pub const ROLE_DELETE: &str = "role:delete";

pub const PERMISSION_READ: &str = "permission:read";
pub const PERMISSION_CREATE: &str = "permission:create";
pub const PERMISSION_DELETE: &str = "permission:delete";

pub const AUDIT_READ: &str = "audit:read";
pub const METRICS_READ: &str = "metrics:read";
pub const UPLOAD_CREATE: &str = "upload:create";

/// Every built-in key with a short description, used by the seeder.
pub const ALL: &[(&str, &str)] = &[
    (ADMIN_ACCESS, "Full access to the admin console"),
    (PRODUCT_CREATE, "Create products"),
    (PRODUCT_UPDATE, "Edit products"),
    (PRODUCT_DELETE, "Delete products"),
    (CATEGORY_CREATE, "Create categories"),
    (CATEGORY_UPDATE, "Edit categories"),
    (CATEGORY_DELETE, "Delete categories"),
    (ORDER_READ, "View all orders"),
    (ORDER_UPDATE, "Change order status"),
    (USER_READ, "View users"),
    (USER_UPDATE, "Edit users and their roles"),
    (USER_DELETE, "Delete users"),
    (ROLE_READ, "View roles"),
    (ROLE_CREATE, "Create roles"),
    (ROLE_UPDATE, "Edit roles and their permissions"),
    (ROLE_DELETE, "Delete roles"),
    (PERMISSION_READ, "View permissions"),
    (PERMISSION_CREATE, "Create permissions"),
    (PERMISSION_DELETE, "Delete permissions"),
    (AUDIT_READ, "Read the audit log"),
    (METRICS_READ, "View the analytics dashboard"),
    (UPLOAD_CREATE, "Upload product images"),
];
