// Fixed names of the video similarity topology.
// Resource records live in `stack`; these are the values every part agrees on.

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";
pub const STACK_NAME: &str = "VideoSimilarityStack";
pub const STACK_DESCRIPTION: &str = "Video similarity search: vector collection, container function and HTTP API";

pub const PARAM_SAGEMAKER_ENDPOINT: &str = "sagemakerEndpoint";
pub const PARAM_SAGEMAKER_ENDPOINT_LABEL: &str = "SageMaker endpoint";
pub const PARAM_SAGEMAKER_ENDPOINT_DESCRIPTION: &str = "Sagemaker endpoint for Resnet50.";
pub const DEFAULT_SAGEMAKER_ENDPOINT: &str = "Resnet50";
pub const KNOWN_PARAMETERS: [&str; 1] = [PARAM_SAGEMAKER_ENDPOINT];

pub const ENV_SAGEMAKER_ENDPOINT: &str = "SAGEMAKER_ENDPOINT";
pub const ENV_OPENSEARCH_HOST: &str = "OPENSEARCH_HOST";

pub const COLLECTION_LOGICAL_ID: &str = "VideoSimilarityCollection";
pub const FUNCTION_LOGICAL_ID: &str = "VideoSimilarityFunction";
pub const ROLE_LOGICAL_ID: &str = "VideoSimilarityFunctionRole";
pub const DEFAULT_POLICY_LOGICAL_ID: &str = "VideoSimilarityFunctionRoleDefaultPolicy";
pub const ACCESS_POLICY_LOGICAL_ID: &str = "VideoSimilarityAccessPolicy";
pub const NETWORK_POLICY_LOGICAL_ID: &str = "NetworkSecurityPolicy";
pub const API_LOGICAL_ID: &str = "VideoSimilarityApi";
pub const STAGE_LOGICAL_ID: &str = "VideoSimilarityApiDefaultStage";
pub const INTEGRATION_LOGICAL_ID: &str = "VideoSimilarityApiLambdaIntegration";
pub const ROUTE_LOGICAL_ID_PREFIX: &str = "VideoSimilarityApiRoute";
pub const OUTPUT_API_URL: &str = "ApiUrl";
pub const OUTPUT_API_URL_DESCRIPTION: &str = "HTTP API Gateway URL";

pub const TYPE_COLLECTION: &str = "AWS::OpenSearchServerless::Collection";
pub const TYPE_ACCESS_POLICY: &str = "AWS::OpenSearchServerless::AccessPolicy";
pub const TYPE_SECURITY_POLICY: &str = "AWS::OpenSearchServerless::SecurityPolicy";
pub const TYPE_ROLE: &str = "AWS::IAM::Role";
pub const TYPE_POLICY: &str = "AWS::IAM::Policy";
pub const TYPE_FUNCTION: &str = "AWS::Lambda::Function";
pub const TYPE_PERMISSION: &str = "AWS::Lambda::Permission";
pub const TYPE_HTTP_API: &str = "AWS::ApiGatewayV2::Api";
pub const TYPE_STAGE: &str = "AWS::ApiGatewayV2::Stage";
pub const TYPE_INTEGRATION: &str = "AWS::ApiGatewayV2::Integration";
pub const TYPE_ROUTE: &str = "AWS::ApiGatewayV2::Route";

/// Paths served by the compute image. Every one is a POST bound to the shared integration.
pub const API_ROUTES: [&str; 5] = [
    "get_video_vector",
    "insert_video_vector",
    "search_similarity_videos",
    "video_similarity",
    "create_opensearch_index",
];

pub const CORS_ALLOW_HEADERS: [&str; 2] = ["Content-Type", "Authorization"];
pub const CORS_ALLOW_ORIGINS: [&str; 1] = ["*"];

pub const PSEUDO_REGION: &str = "AWS::Region";
pub const PSEUDO_ACCOUNT_ID: &str = "AWS::AccountId";
pub const PSEUDO_PARTITION: &str = "AWS::Partition";
pub const PSEUDO_URL_SUFFIX: &str = "AWS::URLSuffix";
pub const PSEUDO_STACK_NAME: &str = "AWS::StackName";
