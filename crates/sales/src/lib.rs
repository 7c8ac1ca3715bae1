//! `flame-sales`: orders with their item snapshots, bill numbers, and the
//! payment ledger.

pub mod order;
pub mod payment;

pub use order::{
    order_total, price_line, BillNumber, Customer, NewCustomer, NewOrder, NewOrderLine, Order,
    OrderFilter, OrderItem, OrderLine, OrderStatus, PaymentMethod, ValidatedOrder,
};
pub use payment::{
    NewPayment, Payment, PaymentCustomer, PaymentFilter, PaymentStatus, PaymentSummary,
};
