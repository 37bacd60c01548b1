//! GraphQL documents sent to the commerce API.

/// Exchange a username/password pair for a token pair and profile.
pub const LOGIN: &str = r"
    mutation Login($username: String!, $password: String!) {
        login(
            input: {
                provider: PASSWORD
                credentials: { username: $username, password: $password }
            }
        ) {
            authToken
            refreshToken
            user {
                id
                databaseId
                username
                email
                firstName
                lastName
                displayName: name
                roles {
                    nodes {
                        name
                    }
                }
            }
        }
    }
";

/// Create a customer account.
pub const REGISTER_USER: &str = r"
    mutation RegisterUser($username: String!, $email: String!, $password: String!) {
        registerUser(
            input: {
                username: $username
                email: $email
                password: $password
            }
        ) {
            user {
                id
                username
                email
            }
        }
    }
";

/// Ask the upstream to email a password reset link.
pub const SEND_PASSWORD_RESET: &str = r"
    mutation SendPasswordReset($username: String!) {
        sendPasswordResetEmail(input: { username: $username }) {
            user {
                databaseId
            }
        }
    }
";
