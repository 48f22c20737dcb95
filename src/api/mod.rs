// SPDX-License-Identifier: MPL-2.0

mod client;
mod types;

pub use client::{BlogClient, ClientError};
pub use types::{
    AuthResponse, Comment, Credentials, Like, LikeTarget, NewPost, Post, SignupRequest, User,
};
