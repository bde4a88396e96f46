use nalgebra::{
    Isometry3,
    Matrix3,
    Matrix4,
    Perspective3,
    Point3,
    Vector3,
};

#[derive(Clone, Debug)]
pub struct CameraProjection {
    pub aspect: f32,
    pub fovy: f32,
    pub z_near: f32,
    pub z_far: f32,

    pub projection_matrix: Perspective3<f32>,
}

impl CameraProjection {
    pub fn new(aspect: f32, fovy: f32, z_near: f32, z_far: f32) -> Self {
        Self {
            aspect,
            fovy,
            z_near,
            z_far,
            projection_matrix: camera_matrix(aspect, fovy, z_near, z_far),
        }
    }

    /// Projection for a framebuffer of the given size.
    ///
    /// A zero height is treated as 1 so minimized windows don't produce a
    /// NaN aspect ratio.
    pub fn from_viewport(width: u32, height: u32, fovy: f32, z_near: f32, z_far: f32) -> Self {
        Self::new(aspect_ratio(width, height), fovy, z_near, z_far)
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
        self.recalculate_matrix();
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.set_aspect(aspect_ratio(width, height));
    }

    pub fn recalculate_matrix(&mut self) {
        self.projection_matrix = camera_matrix(self.aspect, self.fovy, self.z_near, self.z_far);
    }

    pub fn matrix(&self) -> Matrix4<f32> {
        self.projection_matrix.to_homogeneous()
    }
}

fn camera_matrix(aspect: f32, fovy: f32, z_near: f32, z_far: f32) -> Perspective3<f32> {
    Perspective3::new(aspect, fovy, z_near, z_far)
}

fn aspect_ratio(width: u32, height: u32) -> f32 {
    width as f32 / height.max(1) as f32
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub eye: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
}

impl Camera {
    pub fn new(eye: Point3<f32>, target: Point3<f32>) -> Self {
        Self {
            eye,
            target,
            up: Vector3::y(),
        }
    }

    pub fn view(&self) -> Isometry3<f32> {
        Isometry3::look_at_rh(&self.eye, &self.target, &self.up)
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        self.view().to_homogeneous()
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Point3::new(0.0, 0.0, 3.0), Point3::origin())
    }
}

pub fn model_view_projection(
    model: &Matrix4<f32>,
    camera: &Camera,
    projection: &CameraProjection,
) -> Matrix4<f32> {
    projection.matrix() * camera.view_matrix() * model
}

/// Matrix that transforms normals with `model`.
///
/// This is the inverse transpose of the upper-left 3x3 block. Singular models
/// get the identity.
pub fn normal_matrix(model: &Matrix4<f32>) -> Matrix3<f32> {
    let linear: Matrix3<f32> = model.fixed_view::<3, 3>(0, 0).into_owned();
    linear
        .try_inverse()
        .map(|inverse| inverse.transpose())
        .unwrap_or_else(Matrix3::identity)
}
