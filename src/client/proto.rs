// Hand-written subset of the `spark.connect` protobuf messages: only the
// fields needed to run a range query, render it with ShowString, and release
// the session. Unknown fields in responses are skipped by prost.

pub const SERVICE: &str = "spark.connect.SparkConnectService";
pub const EXECUTE_PLAN_PATH: &str = "/spark.connect.SparkConnectService/ExecutePlan";
pub const RELEASE_SESSION_PATH: &str = "/spark.connect.SparkConnectService/ReleaseSession";

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UserContext {
    #[prost(string, tag = "1")]
    pub user_id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub user_name: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExecutePlanRequest {
    #[prost(string, tag = "1")]
    pub session_id: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub user_context: ::core::option::Option<UserContext>,
    #[prost(message, optional, tag = "3")]
    pub plan: ::core::option::Option<Plan>,
    #[prost(string, optional, tag = "4")]
    pub client_type: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(string, optional, tag = "6")]
    pub operation_id: ::core::option::Option<::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Plan {
    #[prost(oneof = "plan::OpType", tags = "1")]
    pub op_type: ::core::option::Option<plan::OpType>,
}

pub mod plan {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum OpType {
        #[prost(message, tag = "1")]
        Root(super::Relation),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RelationCommon {
    #[prost(string, tag = "1")]
    pub source_info: ::prost::alloc::string::String,
    #[prost(int64, optional, tag = "2")]
    pub plan_id: ::core::option::Option<i64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Relation {
    #[prost(message, optional, tag = "1")]
    pub common: ::core::option::Option<RelationCommon>,
    #[prost(oneof = "relation::RelType", tags = "15, 20")]
    pub rel_type: ::core::option::Option<relation::RelType>,
}

pub mod relation {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum RelType {
        #[prost(message, tag = "15")]
        Range(super::Range),
        #[prost(message, tag = "20")]
        ShowString(::prost::alloc::boxed::Box<super::ShowString>),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Range {
    #[prost(int64, optional, tag = "1")]
    pub start: ::core::option::Option<i64>,
    #[prost(int64, tag = "2")]
    pub end: i64,
    #[prost(int64, tag = "3")]
    pub step: i64,
    #[prost(int32, optional, tag = "4")]
    pub num_partitions: ::core::option::Option<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ShowString {
    #[prost(message, optional, boxed, tag = "1")]
    pub input: ::core::option::Option<::prost::alloc::boxed::Box<Relation>>,
    #[prost(int32, tag = "2")]
    pub num_rows: i32,
    #[prost(int32, tag = "3")]
    pub truncate: i32,
    #[prost(bool, tag = "4")]
    pub vertical: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExecutePlanResponse {
    #[prost(string, tag = "1")]
    pub session_id: ::prost::alloc::string::String,
    #[prost(string, tag = "12")]
    pub operation_id: ::prost::alloc::string::String,
    #[prost(string, tag = "13")]
    pub response_id: ::prost::alloc::string::String,
    #[prost(oneof = "execute_plan_response::ResponseType", tags = "2, 14")]
    pub response_type: ::core::option::Option<execute_plan_response::ResponseType>,
}

pub mod execute_plan_response {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ArrowBatch {
        #[prost(int64, tag = "1")]
        pub row_count: i64,
        #[prost(bytes = "vec", tag = "2")]
        pub data: ::prost::alloc::vec::Vec<u8>,
    }

    #[derive(Clone, Copy, PartialEq, ::prost::Message)]
    pub struct ResultComplete {}

    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum ResponseType {
        #[prost(message, tag = "2")]
        ArrowBatch(ArrowBatch),
        #[prost(message, tag = "14")]
        ResultComplete(ResultComplete),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReleaseSessionRequest {
    #[prost(string, tag = "1")]
    pub session_id: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub user_context: ::core::option::Option<UserContext>,
    #[prost(string, optional, tag = "3")]
    pub client_type: ::core::option::Option<::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReleaseSessionResponse {
    #[prost(string, tag = "1")]
    pub session_id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub server_side_session_id: ::prost::alloc::string::String,
}
