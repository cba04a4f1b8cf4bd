use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        admin::{AdminUpdateUserRequest, AuditLogList, ProductApprovalRequest, UserList},
        auth::{LoginRequest, LoginResponse, SignupRequest},
        cart::{CartLine, CartView, SetCartQuantityRequest},
        chat::{ConversationList, ConversationSummary, MessageList, SendMessageRequest, StartConversationRequest},
        notifications::NotificationList,
        orders::{CreateOrderRequest, OrderList, OrderWithItems, UpdateOrderStatusRequest},
        payments::{CreatePaymentRequest, PaymentOrderResponse, VerifyPaymentRequest},
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        profile::{AddressList, ChangePasswordRequest, CreateAddressRequest, UpdateProfileRequest},
        reports::{AdminAnalytics, BuyerSummary, FarmerAnalytics},
        reviews::{CreateReviewRequest, ReviewList},
        uploads::UploadForm,
        wishlist::{AddWishlistRequest, WishlistProductList},
    },
    entity::enums::{NotificationKind, OrderStatus, PaymentMethod, PaymentStatus, Role},
    models::{Address, Message, Notification, Order, OrderItem, Product, Review, ShippingAddress, Upload, User},
    response::{ApiResponse, Meta},
    routes::{
        admin, auth, cart, chat, dashboard, health, notifications, orders, payments, products,
        profile, reviews, uploads, wishlist,
    },
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
    }
}

#[derive(OpenApi)]
#[openapi(
    info(title = "PureHarvest API", description = "Farm-to-buyer produce marketplace"),
    paths(
        health::health_check,
        auth::signup,
        auth::login,
        auth::me,
        profile::get_profile,
        profile::update_profile,
        profile::change_password,
        profile::list_addresses,
        profile::add_address,
        profile::delete_address,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        dashboard::farmer_products,
        dashboard::farmer_analytics,
        dashboard::buyer_summary,
        dashboard::logistics_queue,
        cart::cart_list,
        cart::add_to_cart,
        cart::remove_from_cart,
        cart::clear_cart,
        wishlist::list_wishlist,
        wishlist::add_to_wishlist,
        wishlist::remove_from_wishlist,
        orders::create_order,
        orders::list_orders,
        orders::get_order,
        orders::update_order_status,
        reviews::create_review,
        reviews::list_reviews,
        reviews::delete_review,
        chat::send_message,
        chat::list_conversations,
        chat::start_conversation,
        chat::list_messages,
        notifications::list_notifications,
        notifications::mark_read,
        notifications::mark_all_read,
        notifications::delete_notification,
        uploads::upload_file,
        uploads::serve_file,
        payments::create_payment,
        payments::verify_payment,
        admin::list_users,
        admin::update_user,
        admin::deactivate_user,
        admin::list_products,
        admin::set_product_approval,
        admin::list_all_orders,
        admin::analytics,
        admin::list_audit_logs
    ),
    components(
        schemas(
            Role,
            OrderStatus,
            PaymentStatus,
            PaymentMethod,
            NotificationKind,
            User,
            Address,
            ShippingAddress,
            Product,
            Order,
            OrderItem,
            Review,
            Message,
            Notification,
            Upload,
            SignupRequest,
            LoginRequest,
            LoginResponse,
            UpdateProfileRequest,
            ChangePasswordRequest,
            CreateAddressRequest,
            AddressList,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            SetCartQuantityRequest,
            CartLine,
            CartView,
            AddWishlistRequest,
            WishlistProductList,
            CreateOrderRequest,
            UpdateOrderStatusRequest,
            OrderList,
            OrderWithItems,
            CreateReviewRequest,
            ReviewList,
            SendMessageRequest,
            StartConversationRequest,
            ConversationSummary,
            ConversationList,
            MessageList,
            NotificationList,
            UploadForm,
            CreatePaymentRequest,
            PaymentOrderResponse,
            VerifyPaymentRequest,
            AdminUpdateUserRequest,
            ProductApprovalRequest,
            UserList,
            AuditLogList,
            AdminAnalytics,
            FarmerAnalytics,
            BuyerSummary,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Signup, login and token identity"),
        (name = "Profile", description = "Own profile and saved addresses"),
        (name = "Products", description = "Produce catalogue"),
        (name = "Farmer", description = "Farmer dashboard"),
        (name = "Buyer", description = "Buyer dashboard"),
        (name = "Logistics", description = "Delivery queue"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Wishlist", description = "Saved products"),
        (name = "Orders", description = "Checkout and order lifecycle"),
        (name = "Reviews", description = "Product reviews"),
        (name = "Chat", description = "Direct messages"),
        (name = "Notifications", description = "In-app notifications"),
        (name = "Uploads", description = "Product images"),
        (name = "Payments", description = "Online payment gateway"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
