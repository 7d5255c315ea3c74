use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{admin, auth as auth_dto, cart as cart_dto, catalog, orders as order_dto, uploads},
    error::ErrorData,
    metrics::{CategoryShare, Dashboard, DateRange, Deltas, Granularity, SeriesPoint, Summary, TopProduct},
    models::{AuditLog, Category, Order, OrderItem, Permission, Product, Role, User},
    response::{ApiResponse, Meta},
    routes::{admin as admin_routes, auth, cart, catalog as catalog_routes, health, orders},
    session::SESSION_COOKIE,
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
        components.add_security_scheme(
            "session_cookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(SESSION_COOKIE))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::logout,
        auth::current_user,
        catalog_routes::list_categories,
        catalog_routes::get_category,
        catalog_routes::list_products,
        catalog_routes::get_product,
        catalog_routes::search,
        cart::get_cart,
        cart::add_to_cart,
        cart::update_cart,
        cart::remove_from_cart,
        orders::checkout,
        orders::list_orders,
        orders::get_order,
        admin_routes::orders::list_all_orders,
        admin_routes::orders::get_order_admin,
        admin_routes::orders::update_order_status,
        admin_routes::catalog::create_category,
        admin_routes::catalog::update_category,
        admin_routes::catalog::delete_category,
        admin_routes::catalog::create_product,
        admin_routes::catalog::update_product,
        admin_routes::catalog::delete_product,
        admin_routes::access::list_users,
        admin_routes::access::get_user,
        admin_routes::access::update_user,
        admin_routes::access::assign_roles,
        admin_routes::access::delete_user,
        admin_routes::access::list_roles,
        admin_routes::access::get_role,
        admin_routes::access::create_role,
        admin_routes::access::update_role,
        admin_routes::access::set_role_permissions,
        admin_routes::access::delete_role,
        admin_routes::access::list_permissions,
        admin_routes::access::create_permission,
        admin_routes::access::delete_permission,
        admin_routes::audit::list_audit_logs,
        admin_routes::metrics::dashboard,
        admin_routes::metrics::export,
        admin_routes::uploads::upload_image
    ),
    components(
        schemas(
            User,
            Role,
            Permission,
            Category,
            Product,
            Order,
            OrderItem,
            AuditLog,
            ErrorData,
            Meta,
            auth_dto::RegisterRequest,
            auth_dto::LoginRequest,
            auth_dto::LoginResponse,
            auth_dto::MeResponse,
            catalog::CreateCategoryRequest,
            catalog::UpdateCategoryRequest,
            catalog::CreateProductRequest,
            catalog::UpdateProductRequest,
            catalog::ProductList,
            catalog::CategoryList,
            catalog::CategoryWithProducts,
            catalog::SearchResults,
            cart_dto::AddToCartRequest,
            cart_dto::UpdateCartRequest,
            cart_dto::CartItemView,
            cart_dto::CartView,
            order_dto::CheckoutRequest,
            order_dto::UpdateOrderStatusRequest,
            order_dto::OrderWithItems,
            order_dto::OrderList,
            admin::UserList,
            admin::UserWithRoles,
            admin::UpdateUserRequest,
            admin::AssignRolesRequest,
            admin::RoleWithPermissions,
            admin::RoleList,
            admin::CreateRoleRequest,
            admin::UpdateRoleRequest,
            admin::SetRolePermissionsRequest,
            admin::PermissionList,
            admin::CreatePermissionRequest,
            admin::AuditLogList,
            uploads::UploadResponse,
            Dashboard,
            DateRange,
            Granularity,
            Summary,
            Deltas,
            SeriesPoint,
            TopProduct,
            CategoryShare,
            ApiResponse<Product>,
            ApiResponse<catalog::ProductList>,
            ApiResponse<cart_dto::CartView>,
            ApiResponse<order_dto::OrderWithItems>,
            ApiResponse<Dashboard>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration and sessions"),
        (name = "Catalog", description = "Categories, products and search"),
        (name = "Cart", description = "Cookie-backed shopping cart"),
        (name = "Orders", description = "Checkout and order history"),
        (name = "Admin", description = "Catalog, order, audit and upload administration"),
        (name = "Access", description = "Users, roles and permissions"),
        (name = "Metrics", description = "Sales dashboard and exports"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_admin_and_storefront_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/cart",
            "/api/orders",
            "/api/admin/roles/{id}/permissions",
            "/api/admin/metrics/export",
            "/api/admin/uploads",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let schemes = &doc.components.unwrap().security_schemes;
        assert!(schemes.contains_key("bearer_auth"));
        assert!(schemes.contains_key("session_cookie"));
    }
}
