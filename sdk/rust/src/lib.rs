//! Client SDK for the task API.

pub mod client;

pub use client::{
    LoginResponse, NewTask, Owner, SdkError, Task, TaskClient, TaskUpdate,
};
