pub mod batch_item;
pub mod batch_upload;
pub mod case;
pub mod contribution;
pub mod donor;
pub mod notification;

pub use batch_item::Entity as BatchItem;
pub use batch_upload::Entity as BatchUpload;
pub use case::Entity as Case;
pub use contribution::Entity as Contribution;
pub use donor::Entity as Donor;
pub use notification::Entity as Notification;
