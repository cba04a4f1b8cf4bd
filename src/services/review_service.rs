use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use sea_orm::sea_query::LockType;
use uuid::Uuid;

use crate::{
    audit,
    dto::reviews::{CreateReviewRequest, ReviewList, ReviewWithAuthor},
    entity::{
        enums::{NotificationKind, OrderStatus, Role},
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        orders::Entity as Orders,
        products::{ActiveModel as ProductActive, Entity as Products},
        reviews::{ActiveModel as ReviewActive, Column as ReviewCol, Entity as Reviews},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_role},
    models::Review,
    notify::{self, NewNotification},
    response::{ApiResponse, Meta},
    routes::params::{Pagination, ReviewQuery},
    state::AppState,
};

/// Average rounded to one decimal, and the count.
pub fn rating_summary(ratings: &[i32]) -> (f64, i32) {
    if ratings.is_empty() {
        return (0.0, 0);
    }
    let sum: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
    let avg = sum as f64 / ratings.len() as f64;
    ((avg * 10.0).round() / 10.0, ratings.len() as i32)
}

/// Recompute the cached rating columns from every stored review.
async fn refresh_product_rating<C: ConnectionTrait>(conn: &C, product_id: Uuid) -> AppResult<()> {
    let ratings: Vec<i32> = Reviews::find()
        .select_only()
        .column(ReviewCol::Rating)
        .filter(ReviewCol::ProductId.eq(product_id))
        .into_tuple()
        .all(conn)
        .await?;
    let (average, count) = rating_summary(&ratings);

    let product = Products::find_by_id(product_id)
        .lock(LockType::Update)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)?;
    let mut active: ProductActive = product.into();
    active.rating_average = Set(average);
    active.rating_count = Set(count);
    active.update(conn).await?;
    Ok(())
}

pub async fn create_review(
    state: &AppState,
    user: &AuthUser,
    payload: CreateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    ensure_role(user, &[Role::Buyer])?;
    if !(1..=5).contains(&payload.rating) {
        return Err(AppError::BadRequest("rating must be between 1 and 5".into()));
    }

    let order = Orders::find_by_id(payload.order_id)
        .one(&state.orm)
        .await?
        .filter(|o| o.buyer_id == user.user_id)
        .ok_or(AppError::NotFound)?;
    if order.status != OrderStatus::Delivered {
        return Err(AppError::BadRequest(
            "Only delivered orders can be reviewed".into(),
        ));
    }

    let item = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .filter(OrderItemCol::ProductId.eq(payload.product_id))
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::BadRequest("Product is not part of this order".into()))?;

    let duplicate = Reviews::find()
        .filter(ReviewCol::ProductId.eq(payload.product_id))
        .filter(ReviewCol::BuyerId.eq(user.user_id))
        .filter(ReviewCol::OrderId.eq(order.id))
        .one(&state.orm)
        .await?;
    if duplicate.is_some() {
        return Err(AppError::Conflict(
            "You already reviewed this product for this order".into(),
        ));
    }

    let txn = state.orm.begin().await?;
    // the unique index still catches a concurrent duplicate and maps to 409
    let review = ReviewActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(payload.product_id),
        buyer_id: Set(user.user_id),
        order_id: Set(order.id),
        rating: Set(payload.rating),
        comment: Set(payload.comment.filter(|c| !c.trim().is_empty())),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;
    refresh_product_rating(&txn, payload.product_id).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "review_create",
        "reviews",
        serde_json::json!({ "review_id": review.id, "product_id": review.product_id }),
    )
    .await;
    notify::dispatch(
        state,
        &[item.farmer_id],
        NewNotification::new(
            NotificationKind::NewReview,
            "New review",
            format!("{} received a {}-star review", item.product_name, review.rating),
        )
        .with_data(serde_json::json!({ "product_id": review.product_id, "review_id": review.id })),
    )
    .await;

    Ok(ApiResponse::success("Review added", Review::from(review), Some(Meta::empty())))
}

pub async fn list_reviews(
    state: &AppState,
    pagination: Pagination,
    query: ReviewQuery,
) -> AppResult<ApiResponse<ReviewList>> {
    let product_id = query
        .product_id
        .ok_or_else(|| AppError::BadRequest("product_id is required".into()))?;
    let page = pagination.normalize();

    let finder = Reviews::find()
        .filter(ReviewCol::ProductId.eq(product_id))
        .order_by_desc(ReviewCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await?;

    let items = finder
        .limit(page.per_page)
        .offset(page.offset)
        .find_also_related(Users)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|(review, buyer)| ReviewWithAuthor {
            review: Review::from(review),
            buyer_name: buyer.map(|b| b.name),
        })
        .collect();

    Ok(ApiResponse::success(
        "Reviews",
        ReviewList { items },
        Some(Meta::paged(&page, total)),
    ))
}

pub async fn delete_review(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let review = Reviews::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    if review.buyer_id != user.user_id && !user.is_admin() {
        return Err(AppError::Forbidden);
    }

    let txn = state.orm.begin().await?;
    Reviews::delete_by_id(review.id).exec(&txn).await?;
    refresh_product_rating(&txn, review.product_id).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "review_delete",
        "reviews",
        serde_json::json!({ "review_id": review.id, "product_id": review.product_id }),
    )
    .await;

    Ok(ApiResponse::success("Review deleted", serde_json::json!({}), Some(Meta::empty())))
}

#[cfg(test)]
mod tests {
    use super::rating_summary;

    #[test]
    fn empty_ratings_reset_to_zero() {
        assert_eq!(rating_summary(&[]), (0.0, 0));
    }

    #[test]
    fn average_is_rounded_to_one_decimal() {
        assert_eq!(rating_summary(&[5, 4, 4]), (4.3, 3));
        assert_eq!(rating_summary(&[1, 2]), (1.5, 2));
    }
}
