pub mod audit_logs;
pub mod categories;
pub mod order_items;
pub mod orders;
pub mod permissions;
pub mod products;
pub mod role_permissions;
pub mod roles;
pub mod user_roles;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use categories::Entity as Categories;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use permissions::Entity as Permissions;
pub use products::Entity as Products;
pub use role_permissions::Entity as RolePermissions;
pub use roles::Entity as Roles;
pub use user_roles::Entity as UserRoles;
pub use users::Entity as Users;
