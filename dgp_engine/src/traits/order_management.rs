use crate::{
    db_types::{NewOrder, Order, OrderCode, OrderStatusType, OrderUpdate},
    traits::LedgerError,
};

/// Order storage and lifecycle transitions.
#[allow(async_fn_in_trait)]
pub trait OrderManagement: Clone {
    /// Stores a brand-new order with status `Created`. Fails with [`LedgerError::OrderAlreadyExists`] if the order
    /// code is taken.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, LedgerError>;

    async fn fetch_order(&self, order_code: &OrderCode) -> Result<Option<Order>, LedgerError>;

    async fn fetch_orders_with_status(&self, status: OrderStatusType) -> Result<Vec<Order>, LedgerError>;

    /// Moves the order to `to`, applying `update` in the same statement.
    ///
    /// The change only happens if the order's current status is a legal predecessor of `to`
    /// (see [`OrderStatusType::can_transition_to`]). Two racing transitions can therefore never both succeed.
    /// Returns [`LedgerError::IllegalTransition`] with the current status otherwise.
    async fn transition_order(
        &self,
        order_code: &OrderCode,
        to: OrderStatusType,
        update: OrderUpdate,
    ) -> Result<Order, LedgerError>;
}
