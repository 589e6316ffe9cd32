pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

pub mod recipe {

    pub const MIN_COOKING_TIME: i32 = 1;

    pub const MAX_COOKING_TIME: i32 = 1000;

    pub const MIN_AMOUNT: i32 = 1;

    pub const MAX_NAME_LENGTH: usize = 200;
}

pub mod user {

    pub const MAX_USERNAME_LENGTH: usize = 150;

    pub const MAX_NAME_LENGTH: usize = 150;

    pub const MAX_EMAIL_LENGTH: usize = 254;
}

pub mod export {

    pub const CSV_FILENAME: &str = "shopping_list.csv";

    pub const PDF_FILENAME: &str = "shopping_list.pdf";
}
