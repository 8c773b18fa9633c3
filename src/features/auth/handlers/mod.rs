pub mod auth_handler;

pub use auth_handler::{
    __path_assign_role, __path_forgot_password, __path_get_me, __path_list_users, __path_login,
    __path_logout, __path_refresh_token, __path_register, assign_role, forgot_password, get_me,
    list_users, login, logout, refresh_token, register,
};
